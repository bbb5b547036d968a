//! Build the process-wide [`AppState`] once at startup.
//!
//! Grounded on the teacher's `bootstrap.rs`: validate config first and
//! refuse to start on any `ConfigSeverity::Error`-level issue, then
//! construct each subsystem in dependency order, logging a line per step,
//! wrapping each in an `Arc` as it's handed to the next.

use std::sync::Arc;

use sa_acl::AclEngine;
use sa_db::RelationalPool;
use sa_docstore::DocStore;
use sa_domain::config::{Config, ConfigSeverity};
use sa_mcp_client::McpClientBridge;
use sa_providers::OpenAiCompatProvider;
use sa_sessions::{LifecycleManager, SessionStore};
use sa_tools::ToolCatalog;

use crate::state::AppState;

/// Validate `config`, logging every warning and failing loudly (joining
/// every error-severity message) on the first hard error, matching the
/// teacher's "aggregate, then bail" validation style.
fn validate_or_bail(config: &Config) -> anyhow::Result<()> {
    let issues = config.validate();
    let mut hard = Vec::new();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!(%issue, "config warning"),
            ConfigSeverity::Error => {
                tracing::error!(%issue, "config error");
                hard.push(issue.to_string());
            }
        }
    }
    if !hard.is_empty() {
        anyhow::bail!("invalid configuration:\n{}", hard.join("\n"));
    }
    Ok(())
}

pub async fn build_app_state(config: Config) -> anyhow::Result<AppState> {
    validate_or_bail(&config)?;
    let config = Arc::new(config);

    let pool = Arc::new(RelationalPool::connect(&config.db).await?);
    tracing::info!("relational pool connected");

    let docstore = Arc::new(DocStore::connect(&config.docstore).await?);
    tracing::info!("document store connected");

    let acl = Arc::new(AclEngine::load(&config.acl, pool.clone())?);
    tracing::info!(path = %config.acl.path, "acl engine loaded");

    let catalog = Arc::new(ToolCatalog::new(pool.clone(), acl.clone(), config.bi.clone()));
    tracing::info!(tools = catalog.descriptors().len(), "tool catalog ready");

    let peer_sse_url = config.mcp.peer_sse_url.clone().unwrap_or_else(|| {
        format!("http://{}:{}/sse", config.server.host, config.server.port)
    });
    let mcp_client = Arc::new(McpClientBridge::new(peer_sse_url));
    tracing::info!("mcp client bridge constructed");

    let api_key = std::env::var(&config.llm.api_key_env).unwrap_or_default();
    let llm: Arc<dyn sa_providers::LlmProvider> = Arc::new(OpenAiCompatProvider::new(
        "primary",
        config.llm.base_url.clone(),
        api_key,
        config.llm.model.clone(),
        config.llm.timeout_ms,
    )?);
    tracing::info!(model = %config.llm.model, "llm provider ready");

    let session_store = Arc::new(SessionStore::new(docstore.clone()));
    let lifecycle = Arc::new(LifecycleManager::new(pool.clone(), docstore.clone()));

    Ok(AppState {
        config,
        pool,
        docstore,
        acl,
        catalog,
        mcp_client,
        llm,
        session_store,
        lifecycle,
    })
}

/// Connect the MCP client bridge to its peer SSE endpoint, retrying a
/// handful of times since (in the common single-process topology) the
/// peer is this same process's own `/sse` mount, which may not have
/// started accepting connections yet when this task is spawned.
pub async fn connect_mcp_client_with_retry(state: &AppState) {
    const ATTEMPTS: u32 = 10;
    for attempt in 1..=ATTEMPTS {
        match state.mcp_client.connect().await {
            Ok(()) => {
                tracing::info!(
                    tools = state.mcp_client.cached_tool_count(),
                    "mcp client bridge connected"
                );
                return;
            }
            Err(e) if attempt < ATTEMPTS => {
                tracing::warn!(error = %e, attempt, "mcp client bridge connect failed, retrying");
                tokio::time::sleep(std::time::Duration::from_millis(300)).await;
            }
            Err(e) => {
                tracing::error!(error = %e, "mcp client bridge failed to connect after retries");
            }
        }
    }
}

/// Tear down what [`build_app_state`] built, in reverse order (SPEC_FULL.md
/// §5 "Graceful shutdown").
pub async fn shutdown(state: &AppState) {
    tracing::info!("shutting down");
    state.pool.close().await;
    state.docstore.close().await;
}
