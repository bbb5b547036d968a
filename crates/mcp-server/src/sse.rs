//! SSE transport (§4.E): `GET /sse` opens a long-lived event stream,
//! `POST /messages` accepts client-originated frames. Each open `/sse`
//! connection is a distinct session with its own [`uuid::Uuid`] handle;
//! `/messages?session=<id>` looks the handle up by direct key, never by
//! scanning a process-wide map — the bug this rewrite fixes (module docs).

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::Stream;
use parking_lot::RwLock;
use serde::Deserialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use sa_mcp_protocol::{error_codes, CallToolParams, JsonRpcRequest, JsonRpcResponse, ListToolsParams};

use crate::ServerContext;

struct SessionHandle {
    sender: mpsc::UnboundedSender<String>,
    /// Email attached to this session at connect time (e.g. from an
    /// `X-User-Email` header), used as the middle link of `resolveEmail`'s
    /// fallback chain (§4.C).
    email: Option<String>,
}

pub struct SseState {
    ctx: Arc<ServerContext>,
    sessions: RwLock<HashMap<Uuid, SessionHandle>>,
}

impl SseState {
    pub fn new(ctx: Arc<ServerContext>) -> Self {
        Self {
            ctx,
            sessions: RwLock::new(HashMap::new()),
        }
    }
}

pub fn router(ctx: Arc<ServerContext>) -> Router {
    let state = Arc::new(SseState::new(ctx));
    Router::new()
        .route("/sse", get(sse_handler))
        .route("/messages", post(messages_handler))
        .with_state(state)
}

/// Removes the session's handle when the SSE response stream is dropped
/// (client disconnect), so the sessions map never accumulates dead peers.
struct SessionStream {
    id: Uuid,
    state: Arc<SseState>,
    rx: mpsc::UnboundedReceiver<String>,
}

impl Stream for SessionStream {
    type Item = Result<Event, std::convert::Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Self::Item>> {
        match self.rx.poll_recv(cx) {
            Poll::Ready(Some(payload)) => Poll::Ready(Some(Ok(Event::default().data(payload)))),
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for SessionStream {
    fn drop(&mut self) {
        self.state.sessions.write().remove(&self.id);
    }
}

async fn sse_handler(
    State(state): State<Arc<SseState>>,
    headers: HeaderMap,
) -> Sse<impl Stream<Item = Result<Event, std::convert::Infallible>>> {
    let id = Uuid::new_v4();
    let email = headers
        .get("X-User-Email")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    let (tx, rx) = mpsc::unbounded_channel();
    state.sessions.write().insert(
        id,
        SessionHandle {
            sender: tx,
            email,
        },
    );

    // Announce the POST endpoint this session's caller must use, per the
    // MCP SSE transport convention.
    let endpoint_event = format!("/messages?session={id}");
    let handle = state.sessions.read();
    if let Some(session) = handle.get(&id) {
        let _ = session.sender.send(endpoint_event);
    }
    drop(handle);

    let stream = SessionStream { id, state, rx };
    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    session: Uuid,
}

async fn messages_handler(
    State(state): State<Arc<SseState>>,
    Query(query): Query<MessagesQuery>,
    Json(body): Json<serde_json::Value>,
) -> impl IntoResponse {
    let Some(id) = body.get("id").cloned() else {
        // Notification (e.g. notifications/initialized) — no response expected.
        return StatusCode::ACCEPTED;
    };
    let Some(id) = id.as_u64() else {
        return StatusCode::BAD_REQUEST;
    };

    let request: JsonRpcRequest = match serde_json::from_value(body) {
        Ok(r) => r,
        Err(_) => return StatusCode::BAD_REQUEST,
    };

    let session_email = {
        let sessions = state.sessions.read();
        match sessions.get(&query.session) {
            Some(handle) => handle.email.clone(),
            None => return StatusCode::NOT_FOUND,
        }
    };

    let response = handle(&state.ctx, request, session_email.as_deref()).await;
    let payload = match serde_json::to_string(&response) {
        Ok(p) => p,
        Err(_) => return StatusCode::INTERNAL_SERVER_ERROR,
    };

    let sessions = state.sessions.read();
    if let Some(handle) = sessions.get(&query.session) {
        let _ = handle.sender.send(payload);
    } else {
        return StatusCode::NOT_FOUND;
    }
    let _ = id; // id already embedded in `response`
    StatusCode::ACCEPTED
}

async fn handle(
    ctx: &ServerContext,
    req: JsonRpcRequest,
    session_email: Option<&str>,
) -> JsonRpcResponse {
    match req.method.as_str() {
        "initialize" => JsonRpcResponse::ok(
            req.id,
            serde_json::json!({
                "protocolVersion": "2024-11-05",
                "capabilities": { "tools": {} },
                "serverInfo": { "name": "db-mcp-bridge", "version": env!("CARGO_PKG_VERSION") },
            }),
        ),
        "tools/list" => {
            let params: ListToolsParams = req
                .params
                .clone()
                .and_then(|v| serde_json::from_value(v).ok())
                .unwrap_or_default();
            match ctx.list_tools(params.meta.as_ref(), session_email).await {
                Ok(result) => JsonRpcResponse::ok(
                    req.id,
                    serde_json::to_value(result).unwrap_or(serde_json::Value::Null),
                ),
                Err(e) => JsonRpcResponse::err(req.id, error_codes::INTERNAL_ERROR, e.to_string()),
            }
        }
        "tools/call" => {
            let params: CallToolParams = match req
                .params
                .clone()
                .ok_or(())
                .and_then(|v| serde_json::from_value(v).map_err(|_| ()))
            {
                Ok(p) => p,
                Err(_) => {
                    return JsonRpcResponse::err(
                        req.id,
                        error_codes::INVALID_PARAMS,
                        "tools/call requires {name, arguments}",
                    )
                }
            };
            let result = ctx
                .call_tool(&params.name, params.arguments, params.meta.as_ref(), session_email)
                .await;
            JsonRpcResponse::ok(
                req.id,
                serde_json::to_value(result).unwrap_or(serde_json::Value::Null),
            )
        }
        other => JsonRpcResponse::err(
            req.id,
            error_codes::METHOD_NOT_FOUND,
            format!("unknown method: {other}"),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_handles_are_keyed_not_scanned() {
        // Regression test for the fixed bug: two sessions with distinct
        // emails must never cross-resolve. A HashMap keyed by session id
        // makes that structurally impossible (no iteration/first-match).
        let mut map: HashMap<Uuid, SessionHandle> = HashMap::new();
        let (tx_a, _rx_a) = mpsc::unbounded_channel();
        let (tx_b, _rx_b) = mpsc::unbounded_channel();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        map.insert(
            a,
            SessionHandle {
                sender: tx_a,
                email: Some("a@x.com".into()),
            },
        );
        map.insert(
            b,
            SessionHandle {
                sender: tx_b,
                email: Some("b@x.com".into()),
            },
        );
        assert_eq!(map.get(&a).unwrap().email.as_deref(), Some("a@x.com"));
        assert_eq!(map.get(&b).unwrap().email.as_deref(), Some("b@x.com"));
    }
}
