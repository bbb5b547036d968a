//! `sa-mcp-server` — the MCP server transport (SPEC_FULL.md §4.E).
//!
//! Two interchangeable transports share one [`ServerContext`]: newline-
//! delimited JSON-RPC on a pipe ([`pipe::serve_stdio`]), and server-sent
//! events over HTTP ([`sse::router`]). Both resolve the caller's identity
//! through the same chain (request `_meta` → transport session → process
//! fallback) and dispatch through [`sa_tools::ToolCatalog`], which already
//! enforces the ACL gate per call.
//!
//! The teacher-adjacent bug this fixes: a process-wide "transport → email"
//! map scanned with first-match semantics is wrong under concurrency. Here
//! every inbound request carries its own session handle (the pipe has
//! exactly one; each SSE connection mints a fresh [`uuid::Uuid`]), and the
//! email lookup is a direct keyed access against that handle — never a scan.

pub mod pipe;
pub mod sse;

use std::sync::Arc;

use sa_acl::AclEngine;
use sa_domain::config::McpConfig;
use sa_mcp_protocol::{McpToolDef, RequestMeta, ToolCallResult, ToolsListResult};
use sa_tools::ToolCatalog;

/// Shared dependencies for both transports.
pub struct ServerContext {
    pub catalog: Arc<ToolCatalog>,
    pub acl: Arc<AclEngine>,
    pub config: McpConfig,
}

impl ServerContext {
    pub fn new(catalog: Arc<ToolCatalog>, acl: Arc<AclEngine>, config: McpConfig) -> Self {
        Self {
            catalog,
            acl,
            config,
        }
    }

    /// §4.C `resolveEmail`: request `_meta.user_email`, then the caller's
    /// session-attached email (looked up by its own handle, never scanned),
    /// then the process-wide fallback.
    fn resolve_email(&self, meta: Option<&RequestMeta>, session_email: Option<&str>) -> Option<String> {
        AclEngine::resolve_email(
            meta.and_then(|m| m.user_email.as_deref()),
            session_email,
            self.config.fallback_user_email.as_deref(),
        )
    }

    /// `list_tools` (§4.E): filtered catalog for the resolved caller.
    pub async fn list_tools(
        &self,
        meta: Option<&RequestMeta>,
        session_email: Option<&str>,
    ) -> sa_domain::error::Result<ToolsListResult> {
        let email = self.resolve_email(meta, session_email);
        let visible = self
            .acl
            .filter_tools(self.catalog.descriptors(), email.as_deref())
            .await?;
        Ok(ToolsListResult {
            tools: visible.into_iter().map(to_mcp_tool_def).collect(),
        })
    }

    /// `call_tool` (§4.E): ACL-gated dispatch for the resolved caller.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
        meta: Option<&RequestMeta>,
        session_email: Option<&str>,
    ) -> ToolCallResult {
        let email = self.resolve_email(meta, session_email);
        self.catalog.dispatch(name, arguments, email.as_deref()).await
    }
}

fn to_mcp_tool_def(t: sa_domain::model::ToolDescriptor) -> McpToolDef {
    McpToolDef {
        name: t.name,
        description: t.description,
        input_schema: t.input_schema,
    }
}
