//! `/auth/*` handlers (SPEC_FULL.md §4.G, §4.I).

use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use sa_sessions::IdentityProfile;

use crate::api::auth::AuthenticatedUser;
use crate::api::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(rename = "userProfile")]
    pub user_profile: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: sa_domain::model::User,
}

/// `POST /auth/google` — public route; performs the login itself.
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let profile = IdentityProfile::decode(&body.user_profile).map_err(ApiError::from)?;
    let (session, _is_new) = state.lifecycle.login(profile).await.map_err(ApiError::from)?;
    Ok(Json(LoginResponse {
        token: session.token,
        user: sa_domain::model::User {
            email: session.email,
            name: session.name,
            picture: session.picture,
        },
    }))
}

/// `GET /auth/me` — returns the caller's resolved identity.
pub async fn me(Extension(auth): Extension<AuthenticatedUser>) -> impl IntoResponse {
    Json(auth.user)
}

/// `POST /auth/logout` — clears the caller's current token server-side.
pub async fn logout(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
) -> ApiResult<impl IntoResponse> {
    state.lifecycle.logout(&auth.token).await.map_err(ApiError::from)?;
    Ok(StatusCode::NO_CONTENT)
}
