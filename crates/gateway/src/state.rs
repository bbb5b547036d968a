//! Explicit application context shared by the HTTP API, both MCP
//! transports, and the agent orchestrator.
//!
//! Grounded on the teacher's `AppState` (`crates/gateway/src/state.rs`):
//! every subsystem is built once in [`crate::bootstrap`] and handed around
//! as `Arc`-wrapped fields behind a cheaply `Clone`-able struct, since axum
//! requires `State<S>: Clone`.

use std::sync::Arc;

use sa_acl::AclEngine;
use sa_db::RelationalPool;
use sa_docstore::DocStore;
use sa_domain::config::Config;
use sa_mcp_client::McpClientBridge;
use sa_providers::LlmProvider;
use sa_sessions::{LifecycleManager, SessionStore};
use sa_tools::ToolCatalog;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pool: Arc<RelationalPool>,
    pub docstore: Arc<DocStore>,
    pub acl: Arc<AclEngine>,
    pub catalog: Arc<ToolCatalog>,
    pub mcp_client: Arc<McpClientBridge>,
    pub llm: Arc<dyn LlmProvider>,
    pub session_store: Arc<SessionStore>,
    pub lifecycle: Arc<LifecycleManager>,
}
