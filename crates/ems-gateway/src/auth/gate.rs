//! The access gate: one authorization decision per inbound navigation.

use std::sync::Arc;

use ems_core::{Credential, Identity, Role};

use super::identity::{FailureClass, IdentityResolver, LookupError};
use super::rules::{LoginRoute, RouteMatch, RouteRule, RouteTable};
use super::session::{CredentialSlot, SessionProvider};
use super::stats::GateStats;

/// Path of the generic forbidden page.
pub const UNAUTHORIZED_PATH: &str = "/unauthorized";

/// Where a redirected request is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redirect {
    /// A login page.
    Login(String),
    /// The forbidden page; the caller is authenticated but has the wrong role.
    Unauthorized,
    /// The dashboard of an already signed-in caller.
    Dashboard(Role),
}

impl Redirect {
    /// Same-origin relative target.
    #[must_use]
    pub fn location(&self) -> &str {
        match self {
            Self::Login(path) => path.as_str(),
            Self::Unauthorized => UNAUTHORIZED_PATH,
            Self::Dashboard(role) => role.dashboard_path(),
        }
    }
}

/// Outcome of the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Let the request through to page logic, unmodified.
    Allow,
    /// Answer with a redirect.
    Redirect {
        /// Target.
        to: Redirect,
        /// Also expire the credential carrier.
        clear_credential: bool,
    },
}

impl Decision {
    fn redirect(to: Redirect) -> Self {
        Self::Redirect {
            to,
            clear_credential: false,
        }
    }

    /// Redirect target, if any.
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        match self {
            Self::Allow => None,
            Self::Redirect { to, .. } => Some(to.location()),
        }
    }
}

/// Why the gate decided as it did. Internal only, never shown to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    /// Path outside the matcher set.
    Bypassed,
    /// Login page rendered (no credential, failed lookup, or other role).
    LoginPage,
    /// Signed-in caller on their own login page.
    AlreadySignedIn(Role),
    /// Protected path without a credential.
    MissingCredential,
    /// Protected path whose identity lookup failed.
    LookupFailed(FailureClass),
    /// Protected path reached with another role.
    RoleMismatch {
        /// Role the rule requires.
        required: Role,
        /// Role the caller has.
        actual: Role,
    },
    /// Protected path reached with the required role.
    Granted(Role),
}

impl Reason {
    /// Label for logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Bypassed => "bypassed",
            Self::LoginPage => "login_page",
            Self::AlreadySignedIn(_) => "already_signed_in",
            Self::MissingCredential => "missing_credential",
            Self::LookupFailed(_) => "lookup_failed",
            Self::RoleMismatch { .. } => "role_mismatch",
            Self::Granted(_) => "granted",
        }
    }
}

/// Decision plus its reason and, when granted, the resolved identity.
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// What to do with the request.
    pub decision: Decision,
    /// Why.
    pub reason: Reason,
    /// Identity resolved for a granted request.
    pub identity: Option<Identity>,
}

impl Evaluation {
    const fn allow(reason: Reason) -> Self {
        Self {
            decision: Decision::Allow,
            reason,
            identity: None,
        }
    }
}

/// Role-based route authorization.
///
/// Holds no per-request state: every evaluation is a function of the path,
/// the credential, and one fresh identity lookup.
pub struct AccessGate {
    routes: RouteTable,
    session: Arc<dyn SessionProvider>,
    resolver: Arc<dyn IdentityResolver>,
    clear_empty_credential: bool,
    stats: GateStats,
}

impl AccessGate {
    /// Create a gate.
    #[must_use]
    pub fn new(
        routes: RouteTable,
        session: Arc<dyn SessionProvider>,
        resolver: Arc<dyn IdentityResolver>,
    ) -> Self {
        Self {
            routes,
            session,
            resolver,
            clear_empty_credential: false,
            stats: GateStats::new(),
        }
    }

    /// Expire a present-but-blank credential when redirecting to login.
    #[must_use]
    pub fn with_empty_credential_clearing(mut self, enabled: bool) -> Self {
        self.clear_empty_credential = enabled;
        self
    }

    /// Route table.
    #[must_use]
    pub const fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Session provider the gate reads the credential through.
    #[must_use]
    pub fn session(&self) -> &dyn SessionProvider {
        self.session.as_ref()
    }

    /// Identity resolver.
    #[must_use]
    pub fn resolver(&self) -> &dyn IdentityResolver {
        self.resolver.as_ref()
    }

    /// Decision counters.
    #[must_use]
    pub const fn stats(&self) -> &GateStats {
        &self.stats
    }

    /// Decide whether a request for `path` carrying `slot` may proceed.
    ///
    /// Never fails: every lookup failure becomes a redirect (protected
    /// paths) or a rendered login page (login paths).
    pub async fn evaluate(&self, path: &str, slot: &CredentialSlot) -> Evaluation {
        let evaluation = match self.routes.classify(path) {
            RouteMatch::Bypass => Evaluation::allow(Reason::Bypassed),
            RouteMatch::Login(route) => self.evaluate_login(route, slot).await,
            RouteMatch::Protected(rule) => self.evaluate_protected(rule, slot).await,
        };

        self.stats.record(&evaluation.reason);
        evaluation
    }

    async fn evaluate_login(&self, route: &LoginRoute, slot: &CredentialSlot) -> Evaluation {
        if let Some(credential) = slot.credential() {
            if let Ok(identity) = self.lookup(credential).await {
                if route.admits(identity.role) {
                    return Evaluation {
                        decision: Decision::redirect(Redirect::Dashboard(identity.role)),
                        reason: Reason::AlreadySignedIn(identity.role),
                        identity: None,
                    };
                }
            }
        }

        Evaluation::allow(Reason::LoginPage)
    }

    async fn evaluate_protected(&self, rule: &RouteRule, slot: &CredentialSlot) -> Evaluation {
        let to_login = Redirect::Login(rule.login_redirect().to_string());

        let credential = match slot {
            CredentialSlot::Present(credential) => credential,
            CredentialSlot::Empty | CredentialSlot::Absent => {
                return Evaluation {
                    decision: Decision::Redirect {
                        to: to_login,
                        clear_credential: self.clear_empty_credential
                            && matches!(slot, CredentialSlot::Empty),
                    },
                    reason: Reason::MissingCredential,
                    identity: None,
                };
            }
        };

        match self.lookup(credential).await {
            Err(e) => Evaluation {
                decision: Decision::redirect(to_login),
                reason: Reason::LookupFailed(e.class()),
                identity: None,
            },
            Ok(identity) if identity.role != rule.required_role() => Evaluation {
                decision: Decision::redirect(Redirect::Unauthorized),
                reason: Reason::RoleMismatch {
                    required: rule.required_role(),
                    actual: identity.role,
                },
                identity: None,
            },
            Ok(identity) => Evaluation {
                decision: Decision::Allow,
                reason: Reason::Granted(identity.role),
                identity: Some(identity),
            },
        }
    }

    async fn lookup(&self, credential: &Credential) -> Result<Identity, LookupError> {
        let result = self.resolver.resolve(credential).await;
        if let Err(e) = &result {
            let class = e.class();
            self.stats.record_lookup_failure(class);
            tracing::warn!(
                kind = e.kind(),
                class = class.as_str(),
                error = %e,
                "Identity lookup failed"
            );
        }
        result
    }
}

impl std::fmt::Debug for AccessGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessGate")
            .field("routes", &self.routes)
            .field("session", &self.session)
            .field("clear_empty_credential", &self.clear_empty_credential)
            .finish_non_exhaustive()
    }
}
