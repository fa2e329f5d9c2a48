//! Identity resolution against the EMS identity endpoint.

use std::time::Duration;

use async_trait::async_trait;
use ems_core::config::IdentityConfig;
use ems_core::{Credential, Identity, Role};
use serde::Deserialize;
use thiserror::Error;

use crate::GatewayError;

/// Why an identity lookup failed.
///
/// The gate collapses all of these into one outcome; the variants exist for
/// logs and counters only.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LookupError {
    /// Connection refused, DNS failure, reset, or other transport error.
    #[error("Identity service unreachable: {0}")]
    Unavailable(String),

    /// No answer within the configured timeout.
    #[error("Identity lookup timed out")]
    Timeout,

    /// Non-2xx answer.
    #[error("Identity service answered {0}")]
    Status(u16),

    /// 2xx answer whose body is not an identity object.
    #[error("Malformed identity payload: {0}")]
    Malformed(String),

    /// Identity without a role.
    #[error("Identity payload has no role")]
    MissingRole,

    /// Role outside the known set.
    #[error("Identity payload has unknown role: {0}")]
    UnknownRole(String),
}

/// Coarse failure class, separating service faults from rejected credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureClass {
    /// The identity service could not give an answer.
    Unavailable,
    /// The identity service answered, and the answer does not grant a role.
    Rejected,
}

impl FailureClass {
    /// Label for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unavailable => "unavailable",
            Self::Rejected => "rejected",
        }
    }
}

impl LookupError {
    /// Failure class of this error.
    #[must_use]
    pub const fn class(&self) -> FailureClass {
        match self {
            Self::Unavailable(_) | Self::Timeout | Self::Malformed(_) => FailureClass::Unavailable,
            Self::Status(status) if *status >= 500 => FailureClass::Unavailable,
            Self::Status(_) | Self::MissingRole | Self::UnknownRole(_) => FailureClass::Rejected,
        }
    }

    /// Short machine-readable kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "unavailable",
            Self::Timeout => "timeout",
            Self::Status(_) => "status",
            Self::Malformed(_) => "malformed",
            Self::MissingRole => "missing_role",
            Self::UnknownRole(_) => "unknown_role",
        }
    }

    fn from_transport(error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else {
            Self::Unavailable(error.to_string())
        }
    }
}

/// Resolves a credential to an identity.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Look up the identity behind `credential`.
    async fn resolve(&self, credential: &Credential) -> Result<Identity, LookupError>;

    /// Forget anything remembered about `credential`.
    async fn invalidate(&self, _credential: &Credential) {}
}

/// Body of a successful `/auth/me` answer.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentityPayload {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    department: Option<String>,
    #[serde(default)]
    job_role: Option<String>,
}

impl IdentityPayload {
    fn into_identity(self) -> Result<Identity, LookupError> {
        let role = self
            .role
            .filter(|r| !r.trim().is_empty())
            .ok_or(LookupError::MissingRole)?;
        let role: Role = role.parse().map_err(|_| LookupError::UnknownRole(role))?;

        Ok(Identity {
            role,
            name: self.name,
            email: self.email,
            department: self.department,
            job_role: self.job_role,
        })
    }
}

/// Parse an `/auth/me` body.
///
/// # Errors
///
/// Returns `Malformed`, `MissingRole`, or `UnknownRole`.
pub fn parse_identity(body: &[u8]) -> Result<Identity, LookupError> {
    serde_json::from_slice::<IdentityPayload>(body)
        .map_err(|e| LookupError::Malformed(e.to_string()))?
        .into_identity()
}

/// Resolver calling `GET {baseUrl}/auth/me` with the credential as bearer.
#[derive(Debug, Clone)]
pub struct HttpIdentityResolver {
    client: reqwest::Client,
    endpoint: reqwest::Url,
}

impl HttpIdentityResolver {
    /// Create a resolver for the EMS API at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns error if the URL is invalid or the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let endpoint = reqwest::Url::parse(&format!("{}/auth/me", base_url.trim_end_matches('/')))
            .map_err(|e| GatewayError::Config(format!("Invalid identity URL: {e}")))?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { client, endpoint })
    }

    /// Create a resolver from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the URL is invalid or the HTTP client cannot be built.
    pub fn from_config(config: &IdentityConfig) -> Result<Self, GatewayError> {
        Self::new(&config.base_url, config.timeout())
    }

    /// Lookup URL.
    #[must_use]
    pub const fn endpoint(&self) -> &reqwest::Url {
        &self.endpoint
    }
}

#[async_trait]
impl IdentityResolver for HttpIdentityResolver {
    async fn resolve(&self, credential: &Credential) -> Result<Identity, LookupError> {
        let response = self
            .client
            .get(self.endpoint.clone())
            .bearer_auth(credential.expose())
            .send()
            .await
            .map_err(|e| LookupError::from_transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::Status(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| LookupError::from_transport(&e))?;

        parse_identity(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_identity() {
        let identity =
            parse_identity(br#"{"name":"Root","email":"root","role":"ADMIN","department":null}"#)
                .unwrap();
        assert_eq!(identity.role, Role::Admin);
        assert_eq!(identity.name.as_deref(), Some("Root"));
        assert!(identity.department.is_none());
    }

    #[test]
    fn test_parse_identity_failures() {
        assert_eq!(parse_identity(br#"{"name":"x"}"#), Err(LookupError::MissingRole));
        assert_eq!(parse_identity(br#"{"role":null}"#), Err(LookupError::MissingRole));
        assert_eq!(parse_identity(br#"{"role":"  "}"#), Err(LookupError::MissingRole));
        assert_eq!(
            parse_identity(br#"{"role":"MANAGER"}"#),
            Err(LookupError::UnknownRole("MANAGER".to_string()))
        );
        assert!(matches!(
            parse_identity(b"User not found"),
            Err(LookupError::Malformed(_))
        ));
        assert!(matches!(parse_identity(b"null"), Err(LookupError::Malformed(_))));
    }

    #[test]
    fn test_role_must_match_wire_name_exactly() {
        for role in ["hr", "Hr", " HR", "ADMIN "] {
            let body = serde_json::json!({ "role": role }).to_string();
            assert_eq!(
                parse_identity(body.as_bytes()),
                Err(LookupError::UnknownRole(role.to_string())),
                "{role:?}"
            );
        }
        assert_eq!(
            LookupError::UnknownRole("hr".to_string()).class(),
            FailureClass::Rejected
        );
    }

    #[test]
    fn test_failure_classes() {
        assert_eq!(LookupError::Timeout.class(), FailureClass::Unavailable);
        assert_eq!(
            LookupError::Unavailable("refused".into()).class(),
            FailureClass::Unavailable
        );
        assert_eq!(LookupError::Status(503).class(), FailureClass::Unavailable);
        assert_eq!(LookupError::Status(401).class(), FailureClass::Rejected);
        assert_eq!(LookupError::Status(404).class(), FailureClass::Rejected);
        assert_eq!(LookupError::MissingRole.class(), FailureClass::Rejected);
    }

    #[test]
    fn test_endpoint() {
        let resolver =
            HttpIdentityResolver::new("http://localhost:8080/", Duration::from_secs(3)).unwrap();
        assert_eq!(resolver.endpoint().as_str(), "http://localhost:8080/auth/me");

        let resolver =
            HttpIdentityResolver::new("https://api.corp.example/ems", Duration::from_secs(3))
                .unwrap();
        assert_eq!(
            resolver.endpoint().as_str(),
            "https://api.corp.example/ems/auth/me"
        );

        assert!(HttpIdentityResolver::new("not a url", Duration::from_secs(3)).is_err());
    }
}
