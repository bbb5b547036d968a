//! Maps [`sa_domain::error::Error`] onto HTTP responses (SPEC_FULL.md §7).
//!
//! The teacher's handlers each build their own `(StatusCode, Json(...))`
//! tuple inline rather than relying on a shared `IntoResponse` impl for a
//! common error type; we keep that per-handler shape for the status codes
//! that differ by route, but factor the common "domain error -> JSON body"
//! projection into one place since every handler here ultimately wraps the
//! same `sa_domain::error::Error`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use sa_domain::error::Error;

pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = Json(json!({ "error": self.0.to_mcp_message() }));
        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
