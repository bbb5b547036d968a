use serde::Serialize;

/// Structured trace events emitted across all db-mcp-bridge crates.
///
/// Each is logged as a single `tracing::info!` with the event serialized
/// into the `trace_event` field, so the observability pipeline can index on
/// `event` without parsing free-text messages.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    SessionResolved {
        session_id: String,
        user_id: String,
        is_new: bool,
    },
    SessionDeleted {
        session_id: String,
    },
    MessageAppended {
        session_id: String,
        role: String,
    },
    AuthLogin {
        email: String,
        is_new_session: bool,
    },
    AuthLogout {
        token_prefix: String,
    },
    AclDecision {
        tool_name: String,
        email: Option<String>,
        allowed: bool,
        reason: String,
    },
    AclCacheRefresh {
        email: String,
        hit: bool,
    },
    McpServerInitialized {
        server_id: String,
        tool_count: usize,
    },
    McpToolCall {
        tool_name: String,
        server_id: String,
        is_error: bool,
        duration_ms: u64,
    },
    AgentLoopRound {
        session_id: String,
        round: usize,
        tool_calls: usize,
    },
    AgentLoopBudgetExceeded {
        session_id: String,
        rounds: usize,
    },
    SqlExecuted {
        duration_ms: u64,
        row_count: usize,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "sa_event");
    }
}
