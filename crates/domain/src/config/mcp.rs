use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// MCP client bridge (§4.F) + identity fallback (§4.C resolveEmail step 3)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpConfig {
    /// SSE endpoint of the peer MCP server the orchestrator talks to.
    /// When unset, defaults to this process's own `/sse` mount.
    #[serde(default)]
    pub peer_sse_url: Option<String>,

    /// Process-wide fallback email used by `resolveEmail` (§4.C step 3)
    /// when no `meta.user_email` and no session-attached email is present
    /// (e.g. the pipe transport, which has exactly one peer and no HTTP
    /// session to carry an `X-User-Email` header).
    #[serde(default)]
    pub fallback_user_email: Option<String>,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            peer_sse_url: None,
            fallback_user_email: None,
        }
    }
}
