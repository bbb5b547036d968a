//! `sa-gateway` — the single `db-mcp-bridge` binary (SPEC_FULL.md §2
//! "Process topology"): the HTTP API, the MCP server transports (pipe +
//! SSE), and the agent orchestrator that ties them to the hosted LLM API,
//! all sharing one [`state::AppState`] built once in [`bootstrap`].

pub mod api;
pub mod bootstrap;
pub mod cli;
pub mod correlation;
pub mod orchestrator;
pub mod state;

pub use state::AppState;
