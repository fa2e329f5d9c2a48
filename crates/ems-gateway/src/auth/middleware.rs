//! Access gate middleware for axum.

use std::sync::Arc;

use axum::{
    Json,
    extract::{FromRequestParts, Request, State},
    http::{StatusCode, header::SET_COOKIE, request::Parts},
    middleware::Next,
    response::{IntoResponse, Redirect as RedirectResponse, Response},
};
use ems_core::{Identity, Role};

use super::gate::{AccessGate, Decision};
use super::rules::canonical_path;

/// Gate every request before page logic runs.
///
/// Install with `axum::middleware::from_fn_with_state(gate, access_gate)`.
/// The decision is taken on the canonical path (see [`canonical_path`]), the
/// one a file server behind the gate would resolve. Paths that cannot be
/// canonicalized are answered `400` before anything else runs.
///
/// Allowed requests carry the resolved [`Identity`] in their extensions when
/// the path was protected. Redirects are `307` with a relative `Location`.
pub async fn access_gate(
    State(gate): State<Arc<AccessGate>>,
    mut req: Request,
    next: Next,
) -> Response {
    let path = match canonical_path(req.uri().path()) {
        Ok(path) => path,
        Err(e) => {
            tracing::debug!(error = %e, "Rejected request path");
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": "Bad request path" })),
            )
                .into_response();
        }
    };
    let slot = gate.session().credential(req.headers());

    let evaluation = gate.evaluate(&path, &slot).await;

    tracing::debug!(
        path = %path,
        reason = evaluation.reason.as_str(),
        role = evaluation.identity.as_ref().map(|i| i.role.as_str()),
        location = evaluation.decision.location(),
        "Gate decision"
    );

    match evaluation.decision {
        Decision::Allow => {
            if let Some(identity) = evaluation.identity {
                req.extensions_mut().insert(identity);
            }
            next.run(req).await
        }
        Decision::Redirect {
            to,
            clear_credential,
        } => {
            let mut response = RedirectResponse::temporary(to.location()).into_response();
            if clear_credential {
                response
                    .headers_mut()
                    .append(SET_COOKIE, gate.session().clear());
            }
            response
        }
    }
}

/// Extractor for the identity the gate resolved for this request.
///
/// Only present on protected paths, where the gate already enforced the role.
#[derive(Debug, Clone)]
pub struct CurrentIdentity(pub Identity);

impl CurrentIdentity {
    /// Role of the caller.
    #[must_use]
    pub const fn role(&self) -> Role {
        self.0.role
    }
}

impl<S> FromRequestParts<S> for CurrentIdentity
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .map(Self)
            .ok_or_else(|| {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(serde_json::json!({ "error": "Not signed in" })),
                )
                    .into_response()
            })
    }
}
