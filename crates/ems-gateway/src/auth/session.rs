//! Session provider: the single place the credential is read and written.

use axum::http::{
    HeaderMap, HeaderValue,
    header::{COOKIE, InvalidHeaderValue},
};
use ems_core::Credential;
use ems_core::config::SessionConfig;
use thiserror::Error;

/// Session provider errors.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Cookie name contains characters not allowed in a cookie token.
    #[error("Invalid cookie name: {0:?}")]
    InvalidCookieName(String),

    /// Value cannot be carried in a header.
    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] InvalidHeaderValue),
}

/// What the request carries in place of a credential.
#[derive(Debug, Clone)]
pub enum CredentialSlot {
    /// A usable credential.
    Present(Credential),
    /// The carrier exists but holds a blank value.
    Empty,
    /// No carrier at all.
    Absent,
}

impl CredentialSlot {
    /// The credential, if any.
    #[must_use]
    pub const fn credential(&self) -> Option<&Credential> {
        match self {
            Self::Present(credential) => Some(credential),
            Self::Empty | Self::Absent => None,
        }
    }
}

impl From<Option<Credential>> for CredentialSlot {
    fn from(credential: Option<Credential>) -> Self {
        credential.map_or(Self::Absent, Self::Present)
    }
}

/// Source of truth for the current credential.
///
/// The gate only reads through this trait; the login and logout endpoints
/// are the only writers.
pub trait SessionProvider: Send + Sync + std::fmt::Debug {
    /// Read the credential from request headers.
    fn credential(&self, headers: &HeaderMap) -> CredentialSlot;

    /// `Set-Cookie` value that stores `credential`.
    ///
    /// # Errors
    ///
    /// Returns error if the credential cannot be carried in a header.
    fn establish(&self, credential: &Credential) -> Result<HeaderValue, SessionError>;

    /// `Set-Cookie` value that removes the credential.
    fn clear(&self) -> HeaderValue;
}

/// Cookie-backed session.
#[derive(Debug, Clone)]
pub struct CookieSession {
    name: String,
    secure: bool,
    cleared: HeaderValue,
}

impl CookieSession {
    /// Create a cookie session.
    ///
    /// # Errors
    ///
    /// Returns error if `name` is not a valid cookie name.
    pub fn new(name: impl Into<String>, secure: bool) -> Result<Self, SessionError> {
        let name = name.into();
        if name.is_empty() || !name.bytes().all(is_token_byte) {
            return Err(SessionError::InvalidCookieName(name));
        }

        let cleared = HeaderValue::from_str(&format!(
            "{name}=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax{}",
            secure_attr(secure)
        ))?;

        Ok(Self {
            name,
            secure,
            cleared,
        })
    }

    /// Create a cookie session from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the configured cookie name is invalid.
    pub fn from_config(config: &SessionConfig) -> Result<Self, SessionError> {
        Self::new(config.cookie_name.clone(), config.secure_cookie)
    }

    /// Cookie name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    fn find_value<'a>(&self, headers: &'a HeaderMap) -> Option<&'a str> {
        headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| name.trim() == self.name)
            .map(|(_, value)| value.trim().trim_matches('"'))
    }
}

impl SessionProvider for CookieSession {
    fn credential(&self, headers: &HeaderMap) -> CredentialSlot {
        match self.find_value(headers) {
            Some(value) => Credential::parse(value).map_or(CredentialSlot::Empty, CredentialSlot::Present),
            None => CredentialSlot::Absent,
        }
    }

    fn establish(&self, credential: &Credential) -> Result<HeaderValue, SessionError> {
        let mut value = HeaderValue::from_str(&format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax{}",
            self.name,
            credential.expose(),
            secure_attr(self.secure)
        ))?;
        value.set_sensitive(true);
        Ok(value)
    }

    fn clear(&self) -> HeaderValue {
        self.cleared.clone()
    }
}

const fn secure_attr(secure: bool) -> &'static str {
    if secure { "; Secure" } else { "" }
}

const fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric()
        || matches!(
            b,
            b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.' | b'^' | b'_'
                | b'`' | b'|' | b'~'
        )
}
