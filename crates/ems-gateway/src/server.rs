//! Gateway server.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    middleware,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use ems_core::{Config, Identity, Role};
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::GatewayError;
use crate::auth::{
    AccessGate, CachedIdentityResolver, CookieSession, GateStatsSnapshot, HttpIdentityResolver,
    IdentityResolver, RouteTable, SessionProvider, access_gate,
};
use crate::login::{BackendClient, LoginError, LoginKind};
use crate::middleware::LoginRateLimiter;

/// Gateway server state shared across handlers.
#[derive(Debug)]
pub struct GatewayState {
    /// The access gate.
    pub gate: Arc<AccessGate>,
    /// Backend login client.
    pub backend: BackendClient,
    /// Login throttle.
    pub limiter: LoginRateLimiter,
    /// Effective configuration.
    pub config: Config,
}

/// Gateway server.
#[derive(Debug)]
pub struct Gateway {
    state: Arc<GatewayState>,
    pages: Option<Router>,
}

/// Builder for constructing a Gateway with its dependencies.
#[derive(Default)]
pub struct GatewayBuilder {
    config: Config,
    resolver: Option<Arc<dyn IdentityResolver>>,
    session: Option<Arc<dyn SessionProvider>>,
    pages: Option<Router>,
}

impl GatewayBuilder {
    /// Create a new builder with default config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set configuration.
    #[must_use]
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Use a custom identity resolver instead of the HTTP one.
    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn IdentityResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Use a custom credential carrier instead of the cookie.
    #[must_use]
    pub fn with_session(mut self, session: Arc<dyn SessionProvider>) -> Self {
        self.session = Some(session);
        self
    }

    /// Mount page handlers behind the gate.
    #[must_use]
    pub fn with_pages(mut self, pages: Router) -> Self {
        self.pages = Some(pages);
        self
    }

    /// Build the gateway.
    ///
    /// # Errors
    ///
    /// Returns error if the route table, cookie name, or identity URL is invalid.
    pub fn build(self) -> Result<Gateway, GatewayError> {
        let config = self.config;

        let routes = RouteTable::from_config(&config.routes)
            .map_err(|e| GatewayError::Config(format!("Invalid route table: {e}")))?;

        let session: Arc<dyn SessionProvider> = match self.session {
            Some(session) => session,
            None => Arc::new(
                CookieSession::from_config(&config.session)
                    .map_err(|e| GatewayError::Config(format!("Invalid session cookie: {e}")))?,
            ),
        };

        let resolver: Arc<dyn IdentityResolver> = match self.resolver {
            Some(resolver) => resolver,
            None => {
                let http = HttpIdentityResolver::from_config(&config.identity)?;
                match config.identity.cache_ttl() {
                    Some(ttl) => Arc::new(CachedIdentityResolver::new(http, ttl)),
                    None => Arc::new(http),
                }
            }
        };

        let gate = AccessGate::new(routes, session, resolver)
            .with_empty_credential_clearing(config.session.clear_empty_cookie);

        let backend = BackendClient::new(&config.identity.base_url, config.identity.timeout())?;
        let limiter = LoginRateLimiter::new(config.gateway.login_rate_limit);

        Ok(Gateway {
            state: Arc::new(GatewayState {
                gate: Arc::new(gate),
                backend,
                limiter,
                config,
            }),
            pages: self.pages,
        })
    }
}

impl std::fmt::Debug for GatewayBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayBuilder")
            .field("config", &self.config)
            .field("custom_resolver", &self.resolver.is_some())
            .field("custom_session", &self.session.is_some())
            .finish_non_exhaustive()
    }
}

impl Gateway {
    /// Create a gateway from configuration alone.
    ///
    /// # Errors
    ///
    /// See [`GatewayBuilder::build`].
    pub fn new(config: Config) -> Result<Self, GatewayError> {
        GatewayBuilder::new().with_config(config).build()
    }

    /// Shared state.
    #[must_use]
    pub fn state(&self) -> &Arc<GatewayState> {
        &self.state
    }

    /// Assemble the HTTP application.
    ///
    /// Every request, including the fallback, passes the access gate first.
    pub fn router(&self) -> Router {
        let mut app = Router::new()
            .route("/health", get(health_handler))
            .route("/session/login", post(login_handler))
            .route("/session/admin-login", post(admin_login_handler))
            .route("/session/logout", post(logout_handler))
            .route("/session/me", get(me_handler))
            .with_state(Arc::clone(&self.state));

        if let Some(pages) = &self.pages {
            app = app.merge(pages.clone());
        }

        app = match &self.state.config.gateway.pages_dir {
            Some(dir) => app.fallback_service(ServeDir::new(dir)),
            None => app.fallback(not_found_handler),
        };

        app = app.layer(middleware::from_fn_with_state(
            Arc::clone(&self.state.gate),
            access_gate,
        ));
        if self.state.config.gateway.cors {
            app = app.layer(CorsLayer::permissive());
        }
        app.layer(TraceLayer::new_for_http())
    }

    /// Run the gateway server until interrupted.
    ///
    /// # Errors
    ///
    /// Returns error if the address is invalid or the listener fails.
    pub async fn run(&self) -> Result<(), GatewayError> {
        let gateway = &self.state.config.gateway;
        let addr: SocketAddr = format!("{}:{}", gateway.bind_address(), gateway.port)
            .parse()
            .map_err(|e| GatewayError::Config(format!("Invalid address: {e}")))?;

        tracing::info!(
            matcher = ?self.state.gate.routes().matcher_patterns(),
            identity = %self.state.config.identity.base_url,
            "Access gate armed"
        );
        if let Some(dir) = &gateway.pages_dir {
            tracing::info!(pages = %dir.display(), "Serving pages");
        }

        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Gateway listening on http://{}", addr);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| GatewayError::Server(e.to_string()))
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    gate: GateStatsSnapshot,
}

async fn health_handler(State(state): State<Arc<GatewayState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        gate: state.gate.stats().snapshot(),
    })
}

async fn not_found_handler() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": "Not found" })),
    )
}

#[derive(Deserialize)]
struct StaffLogin {
    email: String,
    password: String,
}

#[derive(Deserialize)]
struct AdminLogin {
    username: String,
    password: String,
}

#[derive(Debug, Serialize)]
struct SignedIn {
    role: Role,
    redirect: &'static str,
}

async fn login_handler(
    State(state): State<Arc<GatewayState>>,
    Json(req): Json<StaffLogin>,
) -> Result<Response, LoginError> {
    sign_in(&state, LoginKind::Staff, &req.email, &req.password).await
}

async fn admin_login_handler(
    State(state): State<Arc<GatewayState>>,
    Json(req): Json<AdminLogin>,
) -> Result<Response, LoginError> {
    sign_in(&state, LoginKind::Admin, &req.username, &req.password).await
}

async fn sign_in(
    state: &GatewayState,
    kind: LoginKind,
    account: &str,
    password: &str,
) -> Result<Response, LoginError> {
    if !state.limiter.check(account) {
        tracing::warn!(?kind, "Login throttled");
        return Err(LoginError::RateLimited);
    }

    let credential = state.backend.login(kind, account, password).await?;

    let identity = state
        .gate
        .resolver()
        .resolve(&credential)
        .await
        .map_err(|e| LoginError::Incomplete(e.kind().to_string()))?;

    let cookie = state
        .gate
        .session()
        .establish(&credential)
        .map_err(|e| LoginError::Incomplete(e.to_string()))?;

    tracing::info!(?kind, role = %identity.role, "Signed in");

    let mut response = Json(SignedIn {
        role: identity.role,
        redirect: identity.role.dashboard_path(),
    })
    .into_response();
    response.headers_mut().insert(SET_COOKIE, cookie);
    Ok(response)
}

/// Clear the session and go back to the matching login page.
async fn logout_handler(State(state): State<Arc<GatewayState>>, headers: HeaderMap) -> Response {
    let gate = &state.gate;
    let slot = gate.session().credential(&headers);

    let role = match slot.credential() {
        Some(credential) => {
            let role = gate.resolver().resolve(credential).await.ok().map(|i| i.role);
            gate.resolver().invalidate(credential).await;
            role
        }
        None => None,
    };

    let target = role.map_or(Role::Employee.login_path(), Role::login_path);
    tracing::info!(role = role.map(Role::as_str), "Signed out");

    let mut response = Redirect::to(target).into_response();
    response
        .headers_mut()
        .append(SET_COOKIE, gate.session().clear());
    response
}

async fn me_handler(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
) -> Result<Json<Identity>, (StatusCode, Json<serde_json::Value>)> {
    let unauthorized = || {
        (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": "Not signed in" })),
        )
    };

    let slot = state.gate.session().credential(&headers);
    let credential = slot.credential().ok_or_else(unauthorized)?;

    state
        .gate
        .resolver()
        .resolve(credential)
        .await
        .map(Json)
        .map_err(|_| unauthorized())
}
