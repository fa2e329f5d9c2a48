//! Bearer credential handling.
//!
//! - `Credential`: opaque session token that never appears in logs
//! - `Credential::fingerprint`: stable digest usable as a map key

use blake2::{Blake2b512, Digest};
use secrecy::{ExposeSecret, SecretBox};

/// Bearer credential identifying a session.
///
/// The inner value is wrapped with `secrecy::SecretBox` so it cannot be
/// printed by accident. Validity is decided solely by the identity service.
pub struct Credential(SecretBox<str>);

impl Credential {
    /// Wrap a raw token value.
    ///
    /// Returns `None` for blank values, which never count as a credential.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let token = raw.trim();
        if token.is_empty() {
            None
        } else {
            Some(Self(SecretBox::new(token.into())))
        }
    }

    /// Expose the token for an upstream call.
    ///
    /// Use sparingly - only when building an `Authorization` header or cookie.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    /// Hex BLAKE2b digest of the token.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = Blake2b512::new();
        hasher.update(self.expose().as_bytes());
        hex::encode(&hasher.finalize()[..32])
    }
}

impl Clone for Credential {
    fn clone(&self) -> Self {
        Self(SecretBox::new(self.expose().into()))
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Credential([REDACTED])")
    }
}

impl std::fmt::Display for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_is_not_a_credential() {
        assert!(Credential::parse("").is_none());
        assert!(Credential::parse("   ").is_none());
        assert_eq!(Credential::parse(" abc ").unwrap().expose(), "abc");
    }

    #[test]
    fn test_redacted_output() {
        let credential = Credential::parse("eyJhbGciOi.secret").unwrap();
        assert_eq!(format!("{credential:?}"), "Credential([REDACTED])");
        assert_eq!(credential.to_string(), "[REDACTED]");
    }

    #[test]
    fn test_fingerprint() {
        let a = Credential::parse("token-a").unwrap();
        let b = Credential::parse("token-b").unwrap();

        assert_eq!(a.fingerprint(), a.clone().fingerprint());
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
        assert!(!a.fingerprint().contains("token"));
    }
}
