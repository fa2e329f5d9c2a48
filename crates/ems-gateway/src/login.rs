//! Sign-in against the EMS backend.

use std::time::Duration;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use ems_core::Credential;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::GatewayError;

/// Login failures. Messages sent to callers stay generic.
#[derive(Debug, Error)]
pub enum LoginError {
    /// Backend refused the account or password.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Too many attempts for this account.
    #[error("Too many login attempts")]
    RateLimited,

    /// Backend could not be reached or failed.
    #[error("Login service unavailable: {0}")]
    Unavailable(String),

    /// Backend accepted the login but its answer carried no usable token.
    #[error("Malformed login response: {0}")]
    Malformed(String),

    /// Token issued but the identity behind it could not be resolved.
    #[error("Sign-in could not be completed: {0}")]
    Incomplete(String),
}

#[derive(Debug, Serialize)]
struct LoginErrorResponse {
    error: &'static str,
    code: &'static str,
}

impl IntoResponse for LoginError {
    fn into_response(self) -> Response {
        let (status, code, error) = match &self {
            Self::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "invalid_credentials",
                "Invalid credentials",
            ),
            Self::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                "Too many login attempts, try again later",
            ),
            Self::Unavailable(_) | Self::Malformed(_) | Self::Incomplete(_) => (
                StatusCode::BAD_GATEWAY,
                "login_unavailable",
                "Login is temporarily unavailable",
            ),
        };

        if status == StatusCode::BAD_GATEWAY {
            tracing::warn!(error = %self, "Login failed upstream");
        }

        (status, Json(LoginErrorResponse { error, code })).into_response()
    }
}

/// Which backend login endpoint to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginKind {
    /// HR and employee accounts, identified by email.
    Staff,
    /// Administrator accounts, identified by username.
    Admin,
}

impl LoginKind {
    const fn path(self) -> &'static str {
        match self {
            Self::Staff => "/auth/login",
            Self::Admin => "/admin/login",
        }
    }

    fn body(self, account: &str, password: &str) -> serde_json::Value {
        match self {
            Self::Staff => serde_json::json!({ "mail": account, "password": password }),
            Self::Admin => serde_json::json!({ "username": account, "password": password }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    token: Option<String>,
}

/// Client for the backend login endpoints.
#[derive(Debug, Clone)]
pub struct BackendClient {
    client: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    /// Create a client for the EMS API at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Exchange an account and password for a credential.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCredentials` on 400/401/403, `Unavailable` on transport
    /// errors or other statuses, `Malformed` when no token comes back.
    pub async fn login(
        &self,
        kind: LoginKind,
        account: &str,
        password: &str,
    ) -> Result<Credential, LoginError> {
        let url = format!("{}{}", self.base_url, kind.path());
        let response = self
            .client
            .post(url)
            .json(&kind.body(account, password))
            .send()
            .await
            .map_err(|e| LoginError::Unavailable(e.to_string()))?;

        let status = response.status();
        if matches!(status.as_u16(), 400 | 401 | 403) {
            return Err(LoginError::InvalidCredentials);
        }
        if !status.is_success() {
            return Err(LoginError::Unavailable(format!("backend answered {status}")));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| LoginError::Malformed(e.to_string()))?;

        body.token
            .as_deref()
            .and_then(Credential::parse)
            .ok_or_else(|| LoginError::Malformed("missing token".to_string()))
    }
}
