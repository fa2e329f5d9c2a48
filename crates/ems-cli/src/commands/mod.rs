//! CLI command implementations.

pub mod check;
pub mod config;
pub mod gateway;
pub mod routes;

pub use check::run_check;
pub use config::run_config;
pub use gateway::run_gateway;
pub use routes::run_routes;
