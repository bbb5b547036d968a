//! The HTTP API (SPEC_FULL.md §4.I): nine routes split into public
//! (`/auth/google`, `/health`) and protected (everything else), gated by
//! the bearer-token middleware (§4.G "Gate").
//!
//! Grounded on the teacher's `api/mod.rs` (public/protected router split
//! via `route_layer` + `middleware::from_fn_with_state`, merged back
//! together with one shared `TraceLayer`), trimmed to this spec's much
//! smaller route set.

pub mod auth;
pub mod auth_routes;
pub mod error;
pub mod health;
pub mod sessions;

use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;

use crate::correlation::attach_correlation_id;
use crate::state::AppState;

/// Build the full HTTP API router.
pub fn router(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/auth/google", post(auth_routes::login))
        .route("/health", get(health::health));

    let protected = Router::new()
        .route("/auth/me", get(auth_routes::me))
        .route("/auth/logout", post(auth_routes::logout))
        .route("/sessions", get(sessions::list_sessions))
        .route("/sessions", post(sessions::create_session))
        .route("/sessions/:id", get(sessions::get_session))
        .route("/sessions/:id", delete(sessions::delete_session))
        .route("/sessions/:id/messages", post(sessions::send_message))
        .route_layer(middleware::from_fn_with_state(state, auth::require_bearer));

    public
        .merge(protected)
        .layer(middleware::from_fn(attach_correlation_id))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
