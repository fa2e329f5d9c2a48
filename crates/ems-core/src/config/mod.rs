//! Configuration loading and validation.
//!
//! JSON5 format, so comments and trailing commas are accepted.
//! Config location: `~/.ems/ems.json`

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::types::Role;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON5 parsing error.
    #[error("Parse error: {0}")]
    Parse(#[from] json5::Error),

    /// Config validation error.
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Gateway server configuration.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Identity service configuration.
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Session cookie configuration.
    #[serde(default)]
    pub session: SessionConfig,

    /// Gated routes.
    #[serde(default)]
    pub routes: RoutesConfig,

    /// Global settings.
    #[serde(default)]
    pub settings: GlobalSettings,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// A missing file yields the defaults. Environment overrides are applied
    /// in both cases.
    ///
    /// # Errors
    ///
    /// Returns error if config cannot be loaded or parsed.
    pub fn load_default() -> Result<Self, ConfigError> {
        Self::load_or_default(&Self::default_path(), |key| std::env::var(key).ok())
    }

    /// Load `path` if it exists, otherwise the defaults, then apply the
    /// overrides `env` returns.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be parsed or the result is invalid.
    pub fn load_or_default(
        path: &Path,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let config = if path.exists() {
            tracing::debug!(path = %path.display(), "Loading config");
            Self::load(path)?
        } else {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            Self::default()
        };
        let config = config.with_overrides(env);
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific path.
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = json5::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a path.
    ///
    /// # Errors
    ///
    /// Returns error if serialization or file write fails.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Validation(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default config file path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        Self::state_dir().join("ems.json")
    }

    /// Get the EMS state directory.
    ///
    /// Uses `EMS_STATE_DIR` env var if set, otherwise `~/.ems`.
    #[must_use]
    pub fn state_dir() -> PathBuf {
        if let Ok(dir) = std::env::var("EMS_STATE_DIR") {
            PathBuf::from(dir)
        } else if let Some(home) = dirs::home_dir() {
            home.join(".ems")
        } else {
            PathBuf::from(".ems")
        }
    }

    /// Apply environment variable overrides.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `EMS_IDENTITY_URL`, `EMS_IDENTITY_TIMEOUT_MS` and `EMS_PORT` as
    /// looked up by `env`. Unparseable numbers are ignored.
    #[must_use]
    pub fn with_overrides(mut self, env: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = env("EMS_IDENTITY_URL") {
            self.identity.base_url = url;
        }

        if let Some(ms) = env("EMS_IDENTITY_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.identity.timeout_ms = ms;
        }

        if let Some(port) = env("EMS_PORT").and_then(|v| v.parse().ok()) {
            self.gateway.port = port;
        }

        self
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gateway.port == 0 {
            return Err(ConfigError::Validation(
                "Gateway port cannot be 0".to_string(),
            ));
        }

        reqwest::Url::parse(&self.identity.base_url).map_err(|e| {
            ConfigError::Validation(format!(
                "Invalid identity base URL '{}': {e}",
                self.identity.base_url
            ))
        })?;

        if !(1..=MAX_IDENTITY_TIMEOUT_MS).contains(&self.identity.timeout_ms) {
            return Err(ConfigError::Validation(format!(
                "Identity timeout must be between 1 and {MAX_IDENTITY_TIMEOUT_MS} ms"
            )));
        }

        if self.session.cookie_name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "Session cookie name cannot be empty".to_string(),
            ));
        }

        if self.gateway.login_rate_limit == 0 {
            return Err(ConfigError::Validation(
                "Login rate limit cannot be 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Upper bound on the identity lookup timeout.
const MAX_IDENTITY_TIMEOUT_MS: u64 = 30_000;

/// Gateway server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bind address mode.
    #[serde(default)]
    pub mode: BindMode,

    /// Enable CORS.
    #[serde(default = "default_true")]
    pub cors: bool,

    /// Directory of pre-rendered pages served behind the gate.
    #[serde(default)]
    pub pages_dir: Option<PathBuf>,

    /// Login attempts allowed per account per minute.
    #[serde(default = "default_login_rate_limit")]
    pub login_rate_limit: u32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            mode: BindMode::default(),
            cors: true,
            pages_dir: None,
            login_rate_limit: default_login_rate_limit(),
        }
    }
}

impl GatewayConfig {
    /// Address string to bind.
    #[must_use]
    pub fn bind_address(&self) -> String {
        match &self.mode {
            BindMode::Local => "127.0.0.1".to_string(),
            BindMode::Public => "0.0.0.0".to_string(),
            BindMode::Custom(addr) => addr.clone(),
        }
    }
}

const fn default_port() -> u16 {
    3000
}

const fn default_true() -> bool {
    true
}

const fn default_login_rate_limit() -> u32 {
    10
}

/// Gateway bind mode.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindMode {
    /// Bind to localhost only.
    #[default]
    Local,
    /// Bind to all interfaces.
    Public,
    /// Custom bind address.
    Custom(String),
}

/// Identity service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityConfig {
    /// Base URL of the EMS API; the lookup goes to `{baseUrl}/auth/me`.
    #[serde(default = "default_identity_url")]
    pub base_url: String,

    /// Lookup timeout in milliseconds. Expiry counts as a lookup failure.
    #[serde(default = "default_identity_timeout")]
    pub timeout_ms: u64,

    /// Seconds to memoize a successful lookup per credential (0 disables).
    #[serde(default)]
    pub cache_ttl_secs: u64,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            base_url: default_identity_url(),
            timeout_ms: default_identity_timeout(),
            cache_ttl_secs: 0,
        }
    }
}

impl IdentityConfig {
    /// Lookup timeout as a `Duration`.
    #[must_use]
    pub const fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_ms)
    }

    /// Cache lifetime, if memoization is enabled.
    #[must_use]
    pub const fn cache_ttl(&self) -> Option<std::time::Duration> {
        if self.cache_ttl_secs == 0 {
            None
        } else {
            Some(std::time::Duration::from_secs(self.cache_ttl_secs))
        }
    }
}

fn default_identity_url() -> String {
    "http://localhost:8080".to_string()
}

const fn default_identity_timeout() -> u64 {
    3000
}

/// Session cookie configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    /// Name of the cookie carrying the bearer credential.
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    /// Mark the cookie `Secure`.
    #[serde(default)]
    pub secure_cookie: bool,

    /// Expire a present-but-empty cookie when redirecting to login.
    #[serde(default = "default_true")]
    pub clear_empty_cookie: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            secure_cookie: false,
            clear_empty_cookie: true,
        }
    }
}

fn default_cookie_name() -> String {
    "token".to_string()
}

/// Gated route configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutesConfig {
    /// Protected prefixes, evaluated in order.
    #[serde(default = "default_rules")]
    pub rules: Vec<RouteRuleConfig>,

    /// Login pages with inverse logic.
    #[serde(default = "default_login_routes")]
    pub login_routes: Vec<LoginRouteConfig>,
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            rules: default_rules(),
            login_routes: default_login_routes(),
        }
    }
}

/// A protected path prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteRuleConfig {
    /// Path prefix, matched on segment boundaries.
    pub prefix: String,
    /// Role required to pass.
    pub role: Role,
    /// Where unauthenticated callers are sent.
    pub login_redirect: String,
}

/// A login page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRouteConfig {
    /// Exact path of the login page.
    pub path: String,
    /// Roles that sign in here and get sent to their dashboard.
    pub roles: Vec<Role>,
}

fn default_rules() -> Vec<RouteRuleConfig> {
    Role::ALL
        .into_iter()
        .map(|role| RouteRuleConfig {
            prefix: format!("/{}", role.as_str().to_ascii_lowercase()),
            role,
            login_redirect: role.login_path().to_string(),
        })
        .collect()
}

fn default_login_routes() -> Vec<LoginRouteConfig> {
    vec![
        LoginRouteConfig {
            path: "/admin/login".to_string(),
            roles: vec![Role::Admin],
        },
        LoginRouteConfig {
            path: "/auth/login".to_string(),
            roles: vec![Role::Hr, Role::Employee],
        },
    ]
}

/// Global settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalSettings {
    /// Enable debug logging.
    #[serde(default)]
    pub debug: bool,

    /// Log format.
    #[serde(default)]
    pub log_format: LogFormat,
}

/// Log format.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable format.
    #[default]
    Pretty,
    /// JSON format.
    Json,
}
