//! The bearer-token gate (SPEC_FULL.md §4.G "added").
//!
//! Grounded on the teacher's `api/auth.rs::require_api_token` shape
//! (constant-time token check, 401 JSON body on failure) but the lookup
//! differs: instead of comparing against one process-wide static secret,
//! it resolves the token against the `auth_sessions` collection via
//! [`sa_sessions::LifecycleManager::validate`] and attaches the resolved
//! [`sa_domain::model::User`] to the request for downstream handlers.

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use sa_domain::model::User;

use crate::state::AppState;

fn unauthorized(message: &str) -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "error": message }))).into_response()
}

pub async fn require_bearer(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    let Some(token) = token else {
        return unauthorized("authentication required");
    };

    match state.lifecycle.validate(token).await {
        Ok(Some(user)) => {
            request.extensions_mut().insert(AuthenticatedUser {
                user,
                token: token.to_string(),
            });
            next.run(request).await
        }
        Ok(None) => unauthorized("invalid or expired token"),
        Err(e) => {
            tracing::error!(error = %e, "auth validate failed");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "internal error" })))
                .into_response()
        }
    }
}

/// The caller's resolved identity, attached by [`require_bearer`] and read
/// back out by downstream handlers via `Extension<AuthenticatedUser>`.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user: User,
    pub token: String,
}
