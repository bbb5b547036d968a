//! The relational pool (SPEC_FULL.md §4.A).
//!
//! Every statement executed through [`RelationalPool`] runs inside a
//! transaction the Postgres engine itself has been told is read-only
//! (`BEGIN TRANSACTION READ ONLY`), so an LLM-authored mutating statement
//! fails at the engine rather than relying on application-level SQL
//! sniffing. This is the only permitted SQL path in the service.

use std::time::Duration;

use serde_json::{Map, Value};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{Column, Row, TypeInfo};

use sa_domain::config::DbConfig;
use sa_domain::error::{Error, Result};

/// The result of a single `query` invocation, ready to serialize as the
/// `query` tool's JSON text body (§4.D.1).
#[derive(Debug, Clone, serde::Serialize)]
pub struct QueryResult {
    pub row_count: usize,
    pub rows: Vec<Value>,
}

/// Bounded connections to the primary SQL store (§4.A, component A).
pub struct RelationalPool {
    pool: sqlx::PgPool,
}

impl RelationalPool {
    /// Connect using the given configuration. Pool sizing and the
    /// acquisition deadline come straight from `cfg`.
    pub async fn connect(cfg: &DbConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(cfg.max_connections)
            .acquire_timeout(Duration::from_millis(cfg.acquire_timeout_ms))
            .idle_timeout(Duration::from_millis(cfg.idle_timeout_ms))
            .connect(&cfg.url)
            .await
            .map_err(|e| Error::BackendFailure(format!("db connect: {e}")))?;
        tracing::info!(max_connections = cfg.max_connections, "relational pool ready");
        Ok(Self { pool })
    }

    /// Close the pool, waiting for in-flight connections to be returned
    /// (SPEC_FULL.md §5 "Graceful shutdown").
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Run a single parameterized, read-only statement and return its rows
    /// serialized as JSON values (§4.A `executeReadOnly`).
    ///
    /// Parameters are bound positionally (`$1`, `$2`, ...) — callers must
    /// never concatenate caller-supplied values into `sql` itself.
    pub async fn execute_read_only(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        self.with_read_only_conn(|conn| {
            let sql = sql.to_string();
            let params = params.to_vec();
            Box::pin(async move { run_statement(conn, &sql, &params).await })
        })
        .await
    }

    /// Acquire a connection, open a read-only transaction, run `f`, then
    /// commit on success or roll back on error. This is the only place a
    /// connection is ever acquired for longer than a single statement, and
    /// even here the span never crosses an await on an external service
    /// (LLM/BI) — only the SQL statement itself runs inside it.
    pub async fn with_read_only_conn<'a, F>(&'a self, f: F) -> Result<QueryResult>
    where
        F: for<'c> FnOnce(
            &'c mut sqlx::PgConnection,
        ) -> std::pin::Pin<
            Box<dyn std::future::Future<Output = Result<QueryResult>> + Send + 'c>,
        >,
    {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| Error::BackendFailure(format!("connection acquire: {e}")))?;

        sqlx::query("BEGIN TRANSACTION READ ONLY")
            .execute(&mut *conn)
            .await
            .map_err(|e| Error::BackendFailure(format!("begin read only: {e}")))?;

        match f(&mut conn).await {
            Ok(result) => {
                sqlx::query("COMMIT")
                    .execute(&mut *conn)
                    .await
                    .map_err(|e| Error::BackendFailure(format!("commit: {e}")))?;
                Ok(result)
            }
            Err(err) => {
                let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                Err(err)
            }
        }
    }
}

async fn run_statement(
    conn: &mut sqlx::PgConnection,
    sql: &str,
    params: &[Value],
) -> Result<QueryResult> {
    let started = std::time::Instant::now();
    let mut query = sqlx::query(sql);
    for p in params {
        query = bind_json_param(query, p);
    }

    let rows = query
        .fetch_all(conn)
        .await
        .map_err(|e| Error::BackendFailure(format!("query failed: {e}")))?;

    let json_rows: Vec<Value> = rows.iter().map(row_to_json).collect();

    sa_domain::trace::TraceEvent::SqlExecuted {
        duration_ms: started.elapsed().as_millis() as u64,
        row_count: json_rows.len(),
    }
    .emit();

    Ok(QueryResult {
        row_count: json_rows.len(),
        rows: json_rows,
    })
}

fn bind_json_param<'q>(
    query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    value: &'q Value,
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    match value {
        Value::Null => query.bind(Option::<String>::None),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                query.bind(i)
            } else if let Some(f) = n.as_f64() {
                query.bind(f)
            } else {
                query.bind(n.to_string())
            }
        }
        Value::String(s) => query.bind(s.clone()),
        other => query.bind(other.clone()),
    }
}

/// Convert a Postgres row into a `serde_json::Value` object, one field per
/// column, best-effort typed by the column's reported type name.
fn row_to_json(row: &PgRow) -> Value {
    let mut map = Map::new();
    for col in row.columns() {
        let name = col.name().to_string();
        let idx = col.ordinal();
        let type_name = col.type_info().name();
        let value = decode_column(row, idx, type_name);
        map.insert(name, value);
    }
    Value::Object(map)
}

fn decode_column(row: &PgRow, idx: usize, type_name: &str) -> Value {
    match type_name {
        "BOOL" => row
            .try_get::<Option<bool>, _>(idx)
            .ok()
            .flatten()
            .map(Value::Bool)
            .unwrap_or(Value::Null),
        "INT2" | "INT4" => row
            .try_get::<Option<i32>, _>(idx)
            .ok()
            .flatten()
            .map(|v| Value::from(v))
            .unwrap_or(Value::Null),
        "INT8" => row
            .try_get::<Option<i64>, _>(idx)
            .ok()
            .flatten()
            .map(Value::from)
            .unwrap_or(Value::Null),
        "FLOAT4" | "FLOAT8" | "NUMERIC" => row
            .try_get::<Option<f64>, _>(idx)
            .ok()
            .flatten()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        "JSON" | "JSONB" => row
            .try_get::<Option<Value>, _>(idx)
            .ok()
            .flatten()
            .unwrap_or(Value::Null),
        "TIMESTAMPTZ" => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(idx)
            .ok()
            .flatten()
            .map(|v| Value::String(v.to_rfc3339()))
            .unwrap_or(Value::Null),
        "TIMESTAMP" => row
            .try_get::<Option<chrono::NaiveDateTime>, _>(idx)
            .ok()
            .flatten()
            .map(|v| Value::String(v.to_string()))
            .unwrap_or(Value::Null),
        "UUID" => row
            .try_get::<Option<uuid::Uuid>, _>(idx)
            .ok()
            .flatten()
            .map(|v| Value::String(v.to_string()))
            .unwrap_or(Value::Null),
        _ => row
            .try_get::<Option<String>, _>(idx)
            .ok()
            .flatten()
            .map(Value::String)
            .unwrap_or(Value::Null),
    }
}

impl RelationalPool {
    /// Look up a staff allow-list record by lowercase email (§4.C
    /// `resolveACLs`). The `staffs` table is external, read-only state —
    /// this crate only ever selects from it, never writes.
    pub async fn find_staff_by_email(
        &self,
        email: &str,
    ) -> Result<Option<sa_domain::model::StaffRecord>> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| Error::BackendFailure(format!("connection acquire: {e}")))?;

        sqlx::query("BEGIN TRANSACTION READ ONLY")
            .execute(&mut *conn)
            .await
            .map_err(|e| Error::BackendFailure(format!("begin read only: {e}")))?;

        let row = sqlx::query("SELECT email, active, acls FROM staffs WHERE lower(email) = $1")
            .bind(email)
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| Error::BackendFailure(format!("staff lookup: {e}")));

        match row {
            Ok(row) => {
                sqlx::query("COMMIT")
                    .execute(&mut *conn)
                    .await
                    .map_err(|e| Error::BackendFailure(format!("commit: {e}")))?;
                Ok(row.map(|r| sa_domain::model::StaffRecord {
                    email: r.get("email"),
                    active: r.get("active"),
                    acls: r.get::<Vec<String>, _>("acls"),
                }))
            }
            Err(e) => {
                let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_json_param_accepts_all_scalar_kinds() {
        // Compile-time/shape check only — exercising against a live Postgres
        // connection belongs in an integration test behind a feature flag.
        let values = vec![
            Value::Null,
            Value::Bool(true),
            Value::from(1i64),
            Value::from(1.5f64),
            Value::String("x".into()),
        ];
        assert_eq!(values.len(), 5);
    }
}
