//! Gate decision counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use super::gate::Reason;
use super::identity::FailureClass;

/// Lock-free counters of gate outcomes.
#[derive(Debug, Default)]
pub struct GateStats {
    bypassed: AtomicU64,
    login_page: AtomicU64,
    already_signed_in: AtomicU64,
    missing_credential: AtomicU64,
    lookup_failed: AtomicU64,
    role_mismatch: AtomicU64,
    granted: AtomicU64,
    lookups_unavailable: AtomicU64,
    lookups_rejected: AtomicU64,
}

/// Point-in-time copy of [`GateStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GateStatsSnapshot {
    /// Requests outside the matcher set.
    pub bypassed: u64,
    /// Login pages rendered.
    pub login_page: u64,
    /// Signed-in callers sent from a login page to their dashboard.
    pub already_signed_in: u64,
    /// Protected requests without a credential.
    pub missing_credential: u64,
    /// Protected requests whose lookup failed.
    pub lookup_failed: u64,
    /// Protected requests with the wrong role.
    pub role_mismatch: u64,
    /// Protected requests let through.
    pub granted: u64,
    /// Lookups that failed on the service side (any route).
    pub lookups_unavailable: u64,
    /// Lookups that failed on the credential side (any route).
    pub lookups_rejected: u64,
}

impl GateStats {
    /// Create zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one decision.
    pub fn record(&self, reason: &Reason) {
        let counter = match reason {
            Reason::Bypassed => &self.bypassed,
            Reason::LoginPage => &self.login_page,
            Reason::AlreadySignedIn(_) => &self.already_signed_in,
            Reason::MissingCredential => &self.missing_credential,
            Reason::LookupFailed(_) => &self.lookup_failed,
            Reason::RoleMismatch { .. } => &self.role_mismatch,
            Reason::Granted(_) => &self.granted,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one failed identity lookup.
    pub fn record_lookup_failure(&self, class: FailureClass) {
        let counter = match class {
            FailureClass::Unavailable => &self.lookups_unavailable,
            FailureClass::Rejected => &self.lookups_rejected,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the current values.
    #[must_use]
    pub fn snapshot(&self) -> GateStatsSnapshot {
        GateStatsSnapshot {
            bypassed: self.bypassed.load(Ordering::Relaxed),
            login_page: self.login_page.load(Ordering::Relaxed),
            already_signed_in: self.already_signed_in.load(Ordering::Relaxed),
            missing_credential: self.missing_credential.load(Ordering::Relaxed),
            lookup_failed: self.lookup_failed.load(Ordering::Relaxed),
            role_mismatch: self.role_mismatch.load(Ordering::Relaxed),
            granted: self.granted.load(Ordering::Relaxed),
            lookups_unavailable: self.lookups_unavailable.load(Ordering::Relaxed),
            lookups_rejected: self.lookups_rejected.load(Ordering::Relaxed),
        }
    }
}
