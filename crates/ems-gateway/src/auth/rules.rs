//! Route table: which paths are gated and by which role.

use ems_core::Role;
use ems_core::config::RoutesConfig;
use thiserror::Error;

/// Route table errors, raised once at startup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RuleError {
    /// Path is not absolute, has a trailing slash, or is the root.
    #[error("Invalid route path '{0}': must start with '/', not end with '/', and not be the root")]
    InvalidPath(String),

    /// A later rule can never match because an earlier one covers it.
    #[error("Rule '{shadowed}' is unreachable: '{by}' is declared first and covers it")]
    Shadowed {
        /// Prefix that never wins.
        shadowed: String,
        /// Earlier, broader prefix.
        by: String,
    },

    /// The same login path is declared twice.
    #[error("Duplicate login route: {0}")]
    DuplicateLoginRoute(String),

    /// Login route with no role that signs in there.
    #[error("Login route '{0}' lists no roles")]
    EmptyLoginRoles(String),
}

/// Request path that cannot be mapped onto a page.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    /// Percent-decoding did not yield UTF-8.
    #[error("Path is not valid UTF-8 after decoding")]
    InvalidEncoding,

    /// A `..` segment, or a backslash a file server may treat as a separator.
    #[error("Path escapes its root")]
    Traversal,
}

/// Resolve a raw request path the way a file server would.
///
/// The path is percent-decoded first, then split on `/`; empty and `.`
/// segments are dropped. `/%61dmin//./x` becomes `/admin/x`. Classify the
/// result, not the raw path, or encoded variants slip past the rules.
///
/// # Errors
///
/// Returns error on invalid UTF-8, a `..` segment, or a backslash.
pub fn canonical_path(raw: &str) -> Result<String, PathError> {
    let decoded = urlencoding::decode(raw).map_err(|_| PathError::InvalidEncoding)?;

    let mut canonical = String::with_capacity(decoded.len());
    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => return Err(PathError::Traversal),
            s if s.contains('\\') => return Err(PathError::Traversal),
            s => {
                canonical.push('/');
                canonical.push_str(s);
            }
        }
    }

    if canonical.is_empty() {
        canonical.push('/');
    }
    Ok(canonical)
}

/// Protected path prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRule {
    prefix: String,
    required_role: Role,
    login_redirect: String,
}

impl RouteRule {
    /// Create a rule.
    ///
    /// # Errors
    ///
    /// Returns error if the prefix or the login redirect is not a valid path.
    pub fn new(
        prefix: impl Into<String>,
        required_role: Role,
        login_redirect: impl Into<String>,
    ) -> Result<Self, RuleError> {
        let prefix = prefix.into();
        let login_redirect = login_redirect.into();
        check_path(&prefix)?;
        check_path(&login_redirect)?;

        Ok(Self {
            prefix,
            required_role,
            login_redirect,
        })
    }

    /// Path prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Role required to pass.
    #[must_use]
    pub const fn required_role(&self) -> Role {
        self.required_role
    }

    /// Login page for unauthenticated callers.
    #[must_use]
    pub fn login_redirect(&self) -> &str {
        &self.login_redirect
    }

    /// Segment-boundary match: `/hr` matches `/hr` and `/hr/...`, not `/hradmin`.
    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        path.strip_prefix(self.prefix.as_str())
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    }
}

/// Login page: already signed-in callers are sent to their dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRoute {
    path: String,
    roles: Vec<Role>,
}

impl LoginRoute {
    /// Create a login route.
    ///
    /// # Errors
    ///
    /// Returns error if the path is invalid or no role is given.
    pub fn new(path: impl Into<String>, roles: Vec<Role>) -> Result<Self, RuleError> {
        let path = path.into();
        check_path(&path)?;
        if roles.is_empty() {
            return Err(RuleError::EmptyLoginRoles(path));
        }
        Ok(Self { path, roles })
    }

    /// Exact path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Roles that sign in on this page.
    #[must_use]
    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    /// Whether `role` signs in here.
    #[must_use]
    pub fn admits(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

/// Result of classifying a request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteMatch<'a> {
    /// Exact login page.
    Login(&'a LoginRoute),
    /// Under a protected prefix.
    Protected(&'a RouteRule),
    /// Outside the matcher set; the gate does not run.
    Bypass,
}

/// Ordered, validated set of login routes and protected rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTable {
    login_routes: Vec<LoginRoute>,
    rules: Vec<RouteRule>,
}

impl RouteTable {
    /// Build a table, checking that no rule is shadowed by an earlier one.
    ///
    /// Overlapping rules are accepted only when the narrower prefix comes
    /// first; that case is logged since declaration order then decides.
    ///
    /// # Errors
    ///
    /// Returns error on shadowed rules or duplicate login routes.
    pub fn new(login_routes: Vec<LoginRoute>, rules: Vec<RouteRule>) -> Result<Self, RuleError> {
        for (i, earlier) in rules.iter().enumerate() {
            for later in &rules[i + 1..] {
                if earlier.matches(later.prefix()) {
                    return Err(RuleError::Shadowed {
                        shadowed: later.prefix().to_string(),
                        by: earlier.prefix().to_string(),
                    });
                }
                if later.matches(earlier.prefix()) {
                    tracing::warn!(
                        narrow = earlier.prefix(),
                        broad = later.prefix(),
                        "Overlapping route rules, first declared wins"
                    );
                }
            }
        }

        for (i, route) in login_routes.iter().enumerate() {
            if login_routes[..i].iter().any(|r| r.path == route.path) {
                return Err(RuleError::DuplicateLoginRoute(route.path.clone()));
            }
        }

        Ok(Self {
            login_routes,
            rules,
        })
    }

    /// Build a table from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if any route is invalid.
    pub fn from_config(config: &RoutesConfig) -> Result<Self, RuleError> {
        let login_routes = config
            .login_routes
            .iter()
            .map(|r| LoginRoute::new(r.path.clone(), r.roles.clone()))
            .collect::<Result<Vec<_>, _>>()?;

        let rules = config
            .rules
            .iter()
            .map(|r| RouteRule::new(r.prefix.clone(), r.role, r.login_redirect.clone()))
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(login_routes, rules)
    }

    /// Classify a path. Login routes are checked first, then rules in order.
    #[must_use]
    pub fn classify(&self, path: &str) -> RouteMatch<'_> {
        if let Some(login) = self.login_routes.iter().find(|r| r.path == path) {
            return RouteMatch::Login(login);
        }

        self.rules
            .iter()
            .find(|rule| rule.matches(path))
            .map_or(RouteMatch::Bypass, RouteMatch::Protected)
    }

    /// Protected rules in evaluation order.
    #[must_use]
    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    /// Login routes.
    #[must_use]
    pub fn login_routes(&self) -> &[LoginRoute] {
        &self.login_routes
    }

    /// Paths on which the gate runs, in matcher notation.
    #[must_use]
    pub fn matcher_patterns(&self) -> Vec<String> {
        self.rules
            .iter()
            .map(|rule| format!("{}/**", rule.prefix))
            .chain(self.login_routes.iter().map(|r| r.path.clone()))
            .collect()
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        let login_routes = RoutesConfig::default()
            .login_routes
            .into_iter()
            .map(|r| LoginRoute {
                path: r.path,
                roles: r.roles,
            })
            .collect();

        let rules = RoutesConfig::default()
            .rules
            .into_iter()
            .map(|r| RouteRule {
                prefix: r.prefix,
                required_role: r.role,
                login_redirect: r.login_redirect,
            })
            .collect();

        Self {
            login_routes,
            rules,
        }
    }
}

fn check_path(path: &str) -> Result<(), RuleError> {
    if !path.starts_with('/') || path.len() < 2 || path.ends_with('/') {
        return Err(RuleError::InvalidPath(path.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn rule(prefix: &str, role: Role) -> RouteRule {
        RouteRule::new(prefix, role, "/auth/login").unwrap()
    }

    #[test]
    fn test_segment_boundary_matching() {
        let hr = rule("/hr", Role::Hr);
        assert!(hr.matches("/hr"));
        assert!(hr.matches("/hr/"));
        assert!(hr.matches("/hr/leave-requests"));
        assert!(!hr.matches("/hradmin"));
        assert!(!hr.matches("/h"));
        assert!(!hr.matches("/admin/hr"));
    }

    #[test]
    fn test_default_table_is_valid() {
        let table = RouteTable::default();
        let rebuilt = RouteTable::from_config(&RoutesConfig::default()).unwrap();
        assert_eq!(table, rebuilt);
    }

    #[test]
    fn test_classify_default_table() {
        let table = RouteTable::default();

        match table.classify("/admin/login") {
            RouteMatch::Login(route) => assert_eq!(route.roles(), &[Role::Admin]),
            other => panic!("expected login route, got {other:?}"),
        }
        match table.classify("/auth/login") {
            RouteMatch::Login(route) => assert!(route.admits(Role::Employee)),
            other => panic!("expected login route, got {other:?}"),
        }
        match table.classify("/admin/employees") {
            RouteMatch::Protected(rule) => {
                assert_eq!(rule.required_role(), Role::Admin);
                assert_eq!(rule.login_redirect(), "/admin/login");
            }
            other => panic!("expected protected route, got {other:?}"),
        }
        match table.classify("/employee/leaves") {
            RouteMatch::Protected(rule) => assert_eq!(rule.required_role(), Role::Employee),
            other => panic!("expected protected route, got {other:?}"),
        }

        assert_eq!(table.classify("/reports"), RouteMatch::Bypass);
        assert_eq!(table.classify("/auth/register"), RouteMatch::Bypass);
        assert_eq!(table.classify("/hradmin"), RouteMatch::Bypass);
        assert_eq!(table.classify("/"), RouteMatch::Bypass);
    }

    #[test]
    fn test_shadowed_rule_rejected() {
        let err = RouteTable::new(
            vec![],
            vec![rule("/hr", Role::Hr), rule("/hr/admin", Role::Admin)],
        )
        .unwrap_err();

        assert_eq!(
            err,
            RuleError::Shadowed {
                shadowed: "/hr/admin".to_string(),
                by: "/hr".to_string(),
            }
        );
    }

    #[test]
    fn test_narrow_rule_first_is_accepted() {
        let table = RouteTable::new(
            vec![],
            vec![rule("/hr/admin", Role::Admin), rule("/hr", Role::Hr)],
        )
        .unwrap();

        match table.classify("/hr/admin/audit") {
            RouteMatch::Protected(rule) => assert_eq!(rule.required_role(), Role::Admin),
            other => panic!("expected protected route, got {other:?}"),
        }
        match table.classify("/hr/dashboard") {
            RouteMatch::Protected(rule) => assert_eq!(rule.required_role(), Role::Hr),
            other => panic!("expected protected route, got {other:?}"),
        }
    }

    #[test]
    fn test_string_prefix_siblings_are_disjoint() {
        assert!(
            RouteTable::new(vec![], vec![rule("/hr", Role::Hr), rule("/hradmin", Role::Admin)])
                .is_ok()
        );
    }

    #[test]
    fn test_invalid_paths() {
        assert!(RouteRule::new("hr", Role::Hr, "/auth/login").is_err());
        assert!(RouteRule::new("/hr/", Role::Hr, "/auth/login").is_err());
        assert!(RouteRule::new("/", Role::Hr, "/auth/login").is_err());
        assert!(RouteRule::new("/hr", Role::Hr, "auth/login").is_err());
        assert_eq!(
            LoginRoute::new("/auth/login", vec![]).unwrap_err(),
            RuleError::EmptyLoginRoles("/auth/login".to_string())
        );
    }

    #[test]
    fn test_duplicate_login_route() {
        let login = LoginRoute::new("/auth/login", vec![Role::Hr]).unwrap();
        let err = RouteTable::new(vec![login.clone(), login], vec![]).unwrap_err();
        assert_eq!(err, RuleError::DuplicateLoginRoute("/auth/login".to_string()));
    }

    #[test]
    fn test_canonical_path() {
        assert_eq!(canonical_path("/admin/dashboard").unwrap(), "/admin/dashboard");
        assert_eq!(canonical_path("/%61dmin/dashboard").unwrap(), "/admin/dashboard");
        assert_eq!(canonical_path("//admin/dashboard").unwrap(), "/admin/dashboard");
        assert_eq!(canonical_path("/./admin/./dashboard").unwrap(), "/admin/dashboard");
        assert_eq!(canonical_path("/admin%2Fdashboard").unwrap(), "/admin/dashboard");
        assert_eq!(canonical_path("/hr/").unwrap(), "/hr");
        assert_eq!(canonical_path("/").unwrap(), "/");
        assert_eq!(canonical_path("").unwrap(), "/");
        assert_eq!(canonical_path("/reports/q%201.html").unwrap(), "/reports/q 1.html");
    }

    #[test]
    fn test_canonical_path_rejects_escapes() {
        assert_eq!(canonical_path("/../admin"), Err(PathError::Traversal));
        assert_eq!(canonical_path("/public/%2e%2e/admin"), Err(PathError::Traversal));
        assert_eq!(canonical_path("/admin%5Cdashboard"), Err(PathError::Traversal));
        assert_eq!(canonical_path("/%ff/admin"), Err(PathError::InvalidEncoding));
    }

    #[test]
    fn test_canonical_variants_classify_alike() {
        let table = RouteTable::default();
        for raw in ["/%61dmin/dashboard", "//admin/dashboard", "/./admin/dashboard"] {
            let path = canonical_path(raw).unwrap();
            match table.classify(&path) {
                RouteMatch::Protected(rule) => assert_eq!(rule.required_role(), Role::Admin),
                other => panic!("{raw}: expected protected route, got {other:?}"),
            }
        }
        match table.classify(&canonical_path("/admin//login").unwrap()) {
            RouteMatch::Login(route) => assert_eq!(route.path(), "/admin/login"),
            other => panic!("expected login route, got {other:?}"),
        }
    }

    #[test]
    fn test_matcher_patterns() {
        assert_eq!(
            RouteTable::default().matcher_patterns(),
            vec![
                "/admin/**",
                "/hr/**",
                "/employee/**",
                "/admin/login",
                "/auth/login",
            ]
        );
    }
}
