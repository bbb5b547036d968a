//! Tools 1–2 of §4.D: `query` and the information-schema introspection
//! trio (`list_tables`, `describe_table`, `list_schemas`).

use std::sync::Arc;

use sa_db::{QueryResult, RelationalPool};
use sa_domain::error::Result;

/// `query(sql, params?)` — run read-only SQL (§4.A) and return
/// `{rowCount, rows}`.
pub async fn query(
    pool: &Arc<RelationalPool>,
    sql: &str,
    params: &[serde_json::Value],
) -> Result<QueryResult> {
    pool.execute_read_only(sql, params).await
}

/// `list_tables(schema?)` — base tables in the given schema (default
/// `public`) via `information_schema.tables`.
pub async fn list_tables(pool: &Arc<RelationalPool>, schema: Option<&str>) -> Result<QueryResult> {
    let schema = schema.unwrap_or("public");
    pool.execute_read_only(
        "SELECT table_name, table_type \
         FROM information_schema.tables \
         WHERE table_schema = $1 AND table_type = 'BASE TABLE' \
         ORDER BY table_name",
        &[serde_json::Value::String(schema.to_string())],
    )
    .await
}

/// `describe_table(table_name, schema?)` — ordered column metadata via
/// `information_schema.columns`.
pub async fn describe_table(
    pool: &Arc<RelationalPool>,
    table_name: &str,
    schema: Option<&str>,
) -> Result<QueryResult> {
    let schema = schema.unwrap_or("public");
    pool.execute_read_only(
        "SELECT column_name, data_type, is_nullable, column_default \
         FROM information_schema.columns \
         WHERE table_schema = $1 AND table_name = $2 \
         ORDER BY ordinal_position",
        &[
            serde_json::Value::String(schema.to_string()),
            serde_json::Value::String(table_name.to_string()),
        ],
    )
    .await
}

/// `list_schemas()` — user schemas, excluding the system catalogs.
pub async fn list_schemas(pool: &Arc<RelationalPool>) -> Result<QueryResult> {
    pool.execute_read_only(
        "SELECT schema_name FROM information_schema.schemata \
         WHERE schema_name NOT IN ('pg_catalog', 'information_schema') \
         ORDER BY schema_name",
        &[],
    )
    .await
}
