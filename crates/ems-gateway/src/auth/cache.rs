//! Short-lived memo of successful identity lookups.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use ems_core::{Credential, Identity};
use tokio::sync::RwLock;
use tokio::time::Instant;

use super::identity::{IdentityResolver, LookupError};

/// Upper bound on remembered credentials.
const MAX_ENTRIES: usize = 10_000;

struct CachedIdentity {
    identity: Identity,
    expires_at: Instant,
}

/// Per-credential memo in front of another resolver.
///
/// Only successes are remembered. A miss, an expired entry, or an inner
/// failure always falls through to the inner resolver, so an error is never
/// masked by a stale answer. Entries are keyed by credential fingerprint.
pub struct CachedIdentityResolver<R> {
    inner: R,
    ttl: Duration,
    entries: RwLock<HashMap<String, CachedIdentity>>,
}

impl<R: IdentityResolver> CachedIdentityResolver<R> {
    /// Wrap `inner`, remembering successes for `ttl`.
    #[must_use]
    pub fn new(inner: R, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Number of live entries.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|e| e.expires_at > now)
            .count()
    }

    /// Whether nothing is remembered.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn remember(&self, key: String, identity: Identity) {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, e| e.expires_at > now);
        if entries.len() >= MAX_ENTRIES {
            tracing::debug!(entries = entries.len(), "Identity cache full, flushing");
            entries.clear();
        }
        entries.insert(
            key,
            CachedIdentity {
                identity,
                expires_at: now + self.ttl,
            },
        );
    }
}

impl<R> std::fmt::Debug for CachedIdentityResolver<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedIdentityResolver")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<R: IdentityResolver> IdentityResolver for CachedIdentityResolver<R> {
    async fn resolve(&self, credential: &Credential) -> Result<Identity, LookupError> {
        let key = credential.fingerprint();

        {
            let entries = self.entries.read().await;
            if let Some(entry) = entries.get(&key) {
                if entry.expires_at > Instant::now() {
                    return Ok(entry.identity.clone());
                }
            }
        }

        match self.inner.resolve(credential).await {
            Ok(identity) => {
                self.remember(key, identity.clone()).await;
                Ok(identity)
            }
            Err(e) => {
                self.entries.write().await.remove(&key);
                Err(e)
            }
        }
    }

    async fn invalidate(&self, credential: &Credential) {
        self.entries.write().await.remove(&credential.fingerprint());
        self.inner.invalidate(credential).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ems_core::Role;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Resolver that replays scripted answers and counts calls.
    struct Scripted {
        answers: Mutex<Vec<Result<Identity, LookupError>>>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(mut answers: Vec<Result<Identity, LookupError>>) -> Self {
            answers.reverse();
            Self {
                answers: Mutex::new(answers),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl IdentityResolver for Scripted {
        async fn resolve(&self, _credential: &Credential) -> Result<Identity, LookupError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answers
                .lock()
                .unwrap()
                .pop()
                .unwrap_or(Err(LookupError::Timeout))
        }
    }

    fn hr() -> Result<Identity, LookupError> {
        Ok(Identity::with_role(Role::Hr))
    }

    #[tokio::test]
    async fn test_hit_skips_inner() {
        let cache = CachedIdentityResolver::new(Scripted::new(vec![hr()]), Duration::from_secs(60));
        let credential = Credential::parse("abc").unwrap();

        assert_eq!(cache.resolve(&credential).await.unwrap().role, Role::Hr);
        assert_eq!(cache.resolve(&credential).await.unwrap().role, Role::Hr);
        assert_eq!(cache.inner.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let cache = CachedIdentityResolver::new(
            Scripted::new(vec![Err(LookupError::Status(401)), hr()]),
            Duration::from_secs(60),
        );
        let credential = Credential::parse("abc").unwrap();

        assert_eq!(
            cache.resolve(&credential).await,
            Err(LookupError::Status(401))
        );
        assert!(cache.is_empty().await);
        assert!(cache.resolve(&credential).await.is_ok());
        assert_eq!(cache.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_goes_back_to_inner() {
        let cache = CachedIdentityResolver::new(
            Scripted::new(vec![hr(), Err(LookupError::Status(401))]),
            Duration::from_secs(5),
        );
        let credential = Credential::parse("abc").unwrap();

        assert!(cache.resolve(&credential).await.is_ok());
        tokio::time::advance(Duration::from_secs(6)).await;

        assert_eq!(
            cache.resolve(&credential).await,
            Err(LookupError::Status(401))
        );
        assert_eq!(cache.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalidate_on_logout() {
        let cache = CachedIdentityResolver::new(
            Scripted::new(vec![hr(), Err(LookupError::Status(401))]),
            Duration::from_secs(60),
        );
        let credential = Credential::parse("abc").unwrap();
        let other = Credential::parse("def").unwrap();

        assert!(cache.resolve(&credential).await.is_ok());
        cache.invalidate(&other).await;
        assert_eq!(cache.len().await, 1);

        cache.invalidate(&credential).await;
        assert!(cache.is_empty().await);
        assert!(cache.resolve(&credential).await.is_err());
    }
}
