//! `sa-mcp-client` — the MCP client bridge (SPEC_FULL.md §4.F).
//!
//! A single outbound SSE connection to a peer MCP server: on connect it
//! performs the `initialize`/`notifications/initialized` handshake, calls
//! `tools/list` once and caches the result, then answers `toolsForLLM()`
//! and `callTool()` against that cache until an explicit `reconnect()` or
//! `refresh_tools()` is issued (§5 "Tool-list cache").

pub mod sse;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use parking_lot::RwLock;
use tokio::sync::{oneshot, Mutex};

use sa_domain::error::{Error, Result};
use sa_domain::tool::ToolDefinition;
use sa_mcp_protocol::{
    initialize_params, CallToolParams, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
    ListToolsParams, McpToolDef, RequestMeta, ToolCallResult, ToolsListResult,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<JsonRpcResponse>>>>;

struct Connection {
    post_url: String,
    pending: PendingMap,
    next_id: AtomicU64,
    reader: tokio::task::JoinHandle<()>,
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// The client bridge's connection to one peer MCP server.
pub struct McpClientBridge {
    sse_url: String,
    http: reqwest::Client,
    conn: RwLock<Option<Arc<Connection>>>,
    tools: RwLock<Vec<McpToolDef>>,
}

impl McpClientBridge {
    pub fn new(sse_url: impl Into<String>) -> Self {
        Self {
            sse_url: sse_url.into(),
            http: reqwest::Client::new(),
            conn: RwLock::new(None),
            tools: RwLock::new(Vec::new()),
        }
    }

    /// Establish the connection, perform the handshake, and populate the
    /// tool-list cache. Idempotent: calling it again is a full
    /// [`reconnect`](Self::reconnect).
    pub async fn connect(&self) -> Result<()> {
        let conn = self.open_sse().await?;
        self.handshake(&conn).await?;
        *self.conn.write() = Some(Arc::new(conn));
        self.refresh_tools().await?;
        Ok(())
    }

    /// Explicit reconnect operation (§5 "Tool-list cache ... otherwise
    /// static for the process lifetime" — an explicit refresh is how a
    /// caller breaks that).
    pub async fn reconnect(&self) -> Result<()> {
        *self.conn.write() = None;
        self.connect().await
    }

    /// Re-run `tools/list` against the current connection and replace the
    /// cache.
    pub async fn refresh_tools(&self) -> Result<()> {
        let result: ToolsListResult = self
            .request(
                "tools/list",
                serde_json::to_value(ListToolsParams::default())
                    .map_err(Error::Json)?,
            )
            .await?;
        sa_domain::trace::TraceEvent::McpServerInitialized {
            server_id: self.sse_url.clone(),
            tool_count: result.tools.len(),
        }
        .emit();
        *self.tools.write() = result.tools;
        Ok(())
    }

    /// The cached tool catalog, converted into the LLM vendor's expected
    /// shape (§4.F `toolsForLLM`).
    pub fn tools_for_llm(&self) -> Vec<ToolDefinition> {
        self.tools
            .read()
            .iter()
            .map(|t| ToolDefinition {
                name: t.name.clone(),
                description: t.description.clone(),
                parameters: t.input_schema.clone(),
            })
            .collect()
    }

    pub fn cached_tool_count(&self) -> usize {
        self.tools.read().len()
    }

    /// Invoke a tool on the peer and return the joined text content
    /// (§4.F `callTool`). Tool-level `isError` results surface as an `Err`
    /// so the orchestrator's `Error: <message>` convention (§4.H.d) applies
    /// uniformly to both transport failures and tool failures.
    pub async fn call_tool(&self, name: &str, arguments: serde_json::Value) -> Result<String> {
        self.call_tool_as(name, arguments, None).await
    }

    /// Same as [`call_tool`](Self::call_tool), overriding the ambient
    /// caller identity for this single call via `_meta.user_email`
    /// (§3 "MCP message").
    pub async fn call_tool_as(
        &self,
        name: &str,
        arguments: serde_json::Value,
        user_email: Option<&str>,
    ) -> Result<String> {
        let started = std::time::Instant::now();
        let params = CallToolParams {
            name: name.to_string(),
            arguments,
            meta: user_email.map(|e| RequestMeta {
                user_email: Some(e.to_string()),
            }),
        };
        let result: ToolCallResult = self
            .request("tools/call", serde_json::to_value(params).map_err(Error::Json)?)
            .await?;

        sa_domain::trace::TraceEvent::McpToolCall {
            tool_name: name.to_string(),
            server_id: self.sse_url.clone(),
            is_error: result.is_error,
            duration_ms: started.elapsed().as_millis() as u64,
        }
        .emit();

        let text = result.joined_text();
        if result.is_error {
            Err(Error::BackendFailure(text))
        } else {
            Ok(text)
        }
    }

    // ── internals ────────────────────────────────────────────────────

    async fn open_sse(&self) -> Result<Connection> {
        let response = self
            .http
            .get(&self.sse_url)
            .header("Accept", "text/event-stream")
            .send()
            .await
            .map_err(|e| Error::BackendFailure(format!("mcp sse connect: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::BackendFailure(format!(
                "mcp sse connect: unexpected status {}",
                response.status()
            )));
        }

        let mut stream = response.bytes_stream();
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let (endpoint_tx, endpoint_rx) = oneshot::channel::<String>();

        let pending_for_reader = pending.clone();
        let reader = tokio::spawn(async move {
            let mut decoder = sse::SseDecoder::new();
            let mut endpoint_tx = Some(endpoint_tx);
            while let Some(chunk) = stream.next().await {
                let chunk = match chunk {
                    Ok(c) => c,
                    Err(e) => {
                        tracing::warn!(error = %e, "mcp sse stream error");
                        break;
                    }
                };
                for event in decoder.feed(&chunk) {
                    match event.event.as_str() {
                        "endpoint" => {
                            if let Some(tx) = endpoint_tx.take() {
                                let _ = tx.send(event.data);
                            }
                        }
                        _ => {
                            if let Ok(resp) = serde_json::from_str::<JsonRpcResponse>(&event.data) {
                                let mut map = pending_for_reader.lock().await;
                                if let Some(sender) = map.remove(&resp.id) {
                                    let _ = sender.send(resp);
                                }
                            }
                        }
                    }
                }
            }
            tracing::debug!("mcp sse stream closed");
        });

        let relative_endpoint = tokio::time::timeout(CONNECT_TIMEOUT, endpoint_rx)
            .await
            .map_err(|_| Error::Timeout("waiting for mcp sse endpoint event".into()))?
            .map_err(|_| Error::BackendFailure("mcp sse stream closed before endpoint event".into()))?;

        let post_url = resolve_endpoint(&self.sse_url, &relative_endpoint);

        Ok(Connection {
            post_url,
            pending,
            next_id: AtomicU64::new(1),
            reader,
        })
    }

    async fn handshake(&self, conn: &Connection) -> Result<()> {
        let params = serde_json::to_value(initialize_params()).map_err(Error::Json)?;
        let _: serde_json::Value = self.request_on(conn, "initialize", params).await?;
        self.notify_on(conn, "notifications/initialized").await?;
        Ok(())
    }

    async fn request<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T> {
        let conn = self
            .conn
            .read()
            .clone()
            .ok_or_else(|| Error::BackendFailure("mcp client bridge not connected".into()))?;
        self.request_on(&conn, method, params).await
    }

    async fn request_on<T: serde::de::DeserializeOwned>(
        &self,
        conn: &Connection,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T> {
        let id = conn.next_id.fetch_add(1, Ordering::Relaxed);
        let req = JsonRpcRequest::new(id, method, Some(params));

        let (tx, rx) = oneshot::channel();
        conn.pending.lock().await.insert(id, tx);

        let send_result = self
            .http
            .post(&conn.post_url)
            .json(&req)
            .send()
            .await;
        if let Err(e) = send_result {
            conn.pending.lock().await.remove(&id);
            return Err(Error::BackendFailure(format!("mcp post {method}: {e}")));
        }

        let resp = tokio::time::timeout(REQUEST_TIMEOUT, rx)
            .await
            .map_err(|_| Error::Timeout(format!("mcp {method} response")))?
            .map_err(|_| Error::BackendFailure("mcp sse stream closed before response".into()))?;

        let value = resp
            .into_result()
            .map_err(|e| Error::BackendFailure(format!("mcp {method}: {e}")))?;
        serde_json::from_value(value).map_err(Error::Json)
    }

    async fn notify_on(&self, conn: &Connection, method: &str) -> Result<()> {
        let notif = JsonRpcNotification::new(method);
        self.http
            .post(&conn.post_url)
            .json(&notif)
            .send()
            .await
            .map_err(|e| Error::BackendFailure(format!("mcp notify {method}: {e}")))?;
        Ok(())
    }
}

/// Resolve a (possibly relative) endpoint the SSE stream announced against
/// the SSE URL's origin.
fn resolve_endpoint(sse_url: &str, endpoint: &str) -> String {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        return endpoint.to_string();
    }
    match reqwest::Url::parse(sse_url).and_then(|base| base.join(endpoint)) {
        Ok(joined) => joined.to_string(),
        Err(_) => endpoint.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_endpoint_keeps_absolute_urls() {
        assert_eq!(
            resolve_endpoint("http://peer/sse", "https://other/messages"),
            "https://other/messages"
        );
    }

    #[test]
    fn resolve_endpoint_joins_relative_path() {
        assert_eq!(
            resolve_endpoint("http://peer:9000/sse", "/messages?session=abc"),
            "http://peer:9000/messages?session=abc"
        );
    }

    #[test]
    fn new_bridge_has_empty_tool_cache() {
        let bridge = McpClientBridge::new("http://localhost:9000/sse");
        assert_eq!(bridge.cached_tool_count(), 0);
        assert!(bridge.tools_for_llm().is_empty());
    }
}
