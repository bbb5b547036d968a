//! Correlation-id middleware (SPEC_FULL.md §4.I "added"): every response
//! carries `x-correlation-id`, mirroring the request's tracing span
//! `request_id` field. The teacher relies on `TraceLayer::new_for_http()`
//! alone for request tracing; this adds the one extra bit spec.md §4.I
//! demands verbatim — that the id is also visible to the HTTP caller, not
//! just the log pipeline.

use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use tracing::Instrument;

const HEADER_NAME: &str = "x-correlation-id";

pub async fn attach_correlation_id(request: Request, next: Next) -> Response {
    let request_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!("http_request", %request_id, method = %request.method(), path = %request.uri().path());

    let mut response = next.run(request).instrument(span).await;
    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response.headers_mut().insert(HEADER_NAME, value);
    }
    response
}
