//! `GET /health` (SPEC_FULL.md §4.I) — public liveness probe.

use axum::response::IntoResponse;
use axum::Json;

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}
