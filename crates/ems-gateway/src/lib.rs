//! # EMS Gateway
//!
//! Role-based access gate in front of the EMS web pages, plus the hosting
//! server that mounts it.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Route authorization: route table, session, identity lookup, the gate.
pub mod auth;
/// Backend sign-in client.
pub mod login;
mod middleware;
mod server;

pub use auth::{
    AccessGate, CurrentIdentity, Decision, Evaluation, IdentityResolver, LookupError, Reason,
    Redirect, RouteTable, SessionProvider, access_gate,
};
pub use login::{BackendClient, LoginError, LoginKind};
pub use middleware::LoginRateLimiter;
pub use server::{Gateway, GatewayBuilder, GatewayState};

/// Start the gateway server.
///
/// # Errors
///
/// Returns error if server fails to start.
pub async fn start(config: ems_core::Config) -> Result<(), GatewayError> {
    let gateway = Gateway::new(config)?;
    gateway.run().await
}

/// Gateway errors.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Server error.
    #[error("Server error: {0}")]
    Server(String),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
