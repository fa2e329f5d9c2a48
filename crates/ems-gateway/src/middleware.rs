//! Login throttling.

use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use std::num::NonZeroU32;

/// Per-account limiter for login attempts.
pub struct LoginRateLimiter {
    account_limiter: RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>,
}

impl LoginRateLimiter {
    /// Create a limiter allowing `attempts_per_minute` per account.
    #[must_use]
    pub fn new(attempts_per_minute: u32) -> Self {
        let quota =
            Quota::per_minute(NonZeroU32::new(attempts_per_minute).unwrap_or(NonZeroU32::MIN));
        Self {
            account_limiter: RateLimiter::keyed(quota),
        }
    }

    /// Check whether another attempt for `account` is allowed.
    ///
    /// Accounts are compared case-insensitively.
    #[must_use]
    pub fn check(&self, account: &str) -> bool {
        self.account_limiter
            .check_key(&account.trim().to_lowercase())
            .is_ok()
    }
}

impl Default for LoginRateLimiter {
    fn default() -> Self {
        Self::new(10)
    }
}

impl std::fmt::Debug for LoginRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRateLimiter").finish_non_exhaustive()
    }
}
