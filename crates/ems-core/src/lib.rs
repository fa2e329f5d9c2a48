//! # EMS Core
//!
//! Core types, credentials, and configuration for the EMS access gateway.
//!
//! This crate provides:
//! - Roles and the identity model returned by the identity service
//! - A redacted bearer credential type
//! - Configuration loading and validation (JSON5 format)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod secrets;
pub mod types;

pub use config::{Config, ConfigError};
pub use secrets::Credential;
pub use types::{Identity, Role, UnknownRole};
