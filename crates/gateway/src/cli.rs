//! CLI surface for the `db-mcp-bridge` binary (SPEC_FULL.md §2 "Process
//! topology"): the default subcommand serves the HTTP API + SSE MCP
//! transport; `mcp-stdio` instead runs the pipe transport to completion,
//! for single-peer embedding (e.g. launched directly by an editor).

use clap::{Parser, Subcommand};

use sa_domain::config::Config;

#[derive(Debug, Parser)]
#[command(name = "db-mcp-bridge", version, about = "Read-only SQL + BI tool bridge over MCP")]
pub struct Cli {
    /// Path to a TOML config file. Missing file falls back to defaults
    /// overridden by environment variables (§6 "Environment").
    #[arg(long, default_value = "config.toml")]
    pub config: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the HTTP API and the SSE MCP transport (the default).
    Serve,
    /// Run the MCP pipe transport on stdin/stdout until it closes.
    McpStdio,
}

/// Load config from `path` (if present) layered with environment overrides
/// for the secrets the file should never carry (§6 "Environment").
pub fn load_config(path: &str) -> anyhow::Result<Config> {
    let mut config: Config = match std::fs::read_to_string(path) {
        Ok(raw) => toml::from_str(&raw)?,
        Err(_) => Config::default(),
    };

    if let Ok(url) = std::env::var("SA_DATABASE_URL") {
        config.db.url = url;
    }
    if let Ok(uri) = std::env::var("SA_DOCSTORE_URI") {
        config.docstore.uri = uri;
    }
    if let Ok(base_url) = std::env::var("SA_LLM_BASE_URL") {
        config.llm.base_url = base_url;
    }
    if let Ok(base_url) = std::env::var("SA_BI_BASE_URL") {
        config.bi.base_url = base_url;
    }

    Ok(config)
}
