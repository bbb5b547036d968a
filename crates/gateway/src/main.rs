//! `db-mcp-bridge` binary entry point (SPEC_FULL.md §2).
//!
//! `serve` (the default) runs the HTTP API and the SSE MCP transport
//! side-by-side in one process, connects the MCP client bridge back to
//! that same `/sse` mount, and drives the agent orchestrator against it.
//! `mcp-stdio` instead runs only the pipe transport to completion, for a
//! single-peer embedding that never touches the HTTP surface at all.
//!
//! Grounded on the teacher's `main.rs` (config validation → sequential
//! subsystem construction → CORS-layered router → `axum::serve`, with
//! signal-based graceful shutdown draining the pool before exit).

use std::sync::Arc;

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use clap::Parser;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::EnvFilter;

use sa_domain::config::CorsConfig;
use sa_gateway::cli::{load_config, Cli, Command};
use sa_gateway::{api, bootstrap, state::AppState};
use sa_mcp_server::ServerContext;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = load_config(&cli.config).context("loading configuration")?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => run_server(config).await,
        Command::McpStdio => run_mcp_stdio(config).await,
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sa_gateway=debug")),
        )
        .json()
        .init();
}

/// Run only the MCP pipe transport (§4.E) until stdin closes. No HTTP
/// surface, no MCP client bridge — a single embedded peer talks to this
/// process directly over stdin/stdout.
async fn run_mcp_stdio(config: sa_domain::config::Config) -> anyhow::Result<()> {
    let state = bootstrap::build_app_state(config).await?;
    let ctx = ServerContext::new(state.catalog.clone(), state.acl.clone(), state.config.mcp.clone());
    sa_mcp_server::pipe::serve_stdio(&ctx).await.context("mcp pipe transport")
}

/// Run the HTTP API and the SSE MCP transport together (§5 "Scheduling
/// model"), then connect the MCP client bridge back to the SSE mount and
/// drive the agent orchestrator against it for the process lifetime.
async fn run_server(config: sa_domain::config::Config) -> anyhow::Result<()> {
    tracing::info!("db-mcp-bridge starting");

    let state = bootstrap::build_app_state(config).await?;

    let mcp_ctx = Arc::new(ServerContext::new(
        state.catalog.clone(),
        state.acl.clone(),
        state.config.mcp.clone(),
    ));
    let mcp_router = sa_mcp_server::sse::router(mcp_ctx);

    let cors_layer = build_cors_layer(&state.config.server.cors);
    let app = api::router(state.clone())
        .merge(mcp_router)
        .layer(cors_layer)
        .with_state(state.clone());

    let addr = format!("{}:{}", state.config.server.host, state.config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;
    tracing::info!(addr = %addr, "db-mcp-bridge listening");

    // The client bridge's peer is this same process's `/sse` mount; it
    // needs the listener bound before it can connect, so the retry loop
    // runs as a background task rather than blocking the server start.
    let client_state = state.clone();
    tokio::spawn(async move {
        bootstrap::connect_mcp_client_with_retry(&client_state).await;
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state.clone()))
        .await
        .context("axum server error")?;

    Ok(())
}

/// Wait for a terminating signal, then drain shared resources (§5
/// "Graceful shutdown") before letting `axum::serve` return.
async fn shutdown_signal(state: AppState) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    bootstrap::shutdown(&state).await;
}

/// Build a [`CorsLayer`] from the configured allowed origins. Origins may
/// carry a trailing `:*` wildcard port (e.g. `http://localhost:*`); a
/// literal `"*"` allows all origins (not recommended for production).
fn build_cors_layer(cors: &CorsConfig) -> CorsLayer {
    use axum::http::header;

    if cors.allowed_origins.len() == 1 && cors.allowed_origins[0] == "*" {
        tracing::warn!("CORS configured with wildcard \"*\" — all origins allowed");
        return CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);
    }

    let mut exact: Vec<HeaderValue> = Vec::new();
    let mut wildcard_prefixes: Vec<String> = Vec::new();

    for origin in &cors.allowed_origins {
        if let Some(prefix) = origin.strip_suffix('*') {
            wildcard_prefixes.push(prefix.to_owned());
        } else if let Ok(hv) = origin.parse::<HeaderValue>() {
            exact.push(hv);
        } else {
            tracing::warn!(origin = %origin, "invalid CORS origin, skipping");
        }
    }

    let allow_origin = if wildcard_prefixes.is_empty() {
        AllowOrigin::list(exact)
    } else {
        AllowOrigin::predicate(move |origin, _| {
            let origin_str = origin.to_str().unwrap_or("");
            if exact.iter().any(|e| e.as_bytes() == origin.as_bytes()) {
                return true;
            }
            wildcard_prefixes.iter().any(|prefix| {
                origin_str
                    .strip_prefix(prefix.as_str())
                    .map(|port| !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()))
                    .unwrap_or(false)
            })
        })
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}
