//! Role-based route authorization for the gateway.
//!
//! This module provides:
//! - The route table of login pages and protected prefixes
//! - The session provider that owns the credential cookie
//! - Identity resolution against the EMS identity endpoint, with an optional memo
//! - The access gate and its axum middleware

mod cache;
mod gate;
mod identity;
mod middleware;
mod rules;
mod session;
mod stats;

pub use cache::CachedIdentityResolver;
pub use gate::{AccessGate, Decision, Evaluation, Reason, Redirect, UNAUTHORIZED_PATH};
pub use identity::{
    FailureClass, HttpIdentityResolver, IdentityResolver, LookupError, parse_identity,
};
pub use middleware::{CurrentIdentity, access_gate};
pub use rules::{
    LoginRoute, PathError, RouteMatch, RouteRule, RouteTable, RuleError, canonical_path,
};
pub use session::{CookieSession, CredentialSlot, SessionError, SessionProvider};
pub use stats::{GateStats, GateStatsSnapshot};
