//! `sa-tools` — the tool catalog (SPEC_FULL.md §4.D) and the SQL
//! analyzer/rule generator (§4.J).
//!
//! [`ToolCatalog`] is the single ACL-gated dispatch entry point every
//! transport (`sa-mcp-server`'s pipe and SSE handlers) calls through.

pub mod analyzer;
pub mod catalog;
pub mod funnel;
pub mod generator;
pub mod redash;
pub mod sql_introspect;

pub use catalog::ToolCatalog;
