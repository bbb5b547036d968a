//! [`ToolCatalog`] — the ACL-gated dispatch entry point for all ten
//! tools (§4.D). Every handler is invoked through the common gate: (i)
//! ACL check, (ii) input schema validation, (iii) handler body, (iv)
//! errors captured as a structured `isError` result, never a crash.

use std::sync::Arc;

use sa_acl::AclEngine;
use sa_db::RelationalPool;
use sa_domain::config::BiConfig;
use sa_domain::model::ToolDescriptor;
use sa_mcp_protocol::ToolCallResult;
use serde_json::Value;

use crate::{analyzer, funnel, generator, redash, sql_introspect};

/// Declarative JSON-schema object for a tool with no required fields.
fn empty_object_schema() -> Value {
    serde_json::json!({"type": "object", "properties": {}})
}

fn descriptor(name: &str, description: &str, input_schema: Value) -> ToolDescriptor {
    ToolDescriptor {
        name: name.to_string(),
        description: description.to_string(),
        input_schema,
        required_acls: Vec::new(),
    }
}

fn tool_descriptors() -> Vec<ToolDescriptor> {
    vec![
        descriptor(
            "query",
            "Run read-only SQL and return {rowCount, rows}.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "sql": {"type": "string"},
                    "params": {"type": "array", "items": {}},
                },
                "required": ["sql"],
            }),
        ),
        descriptor(
            "list_tables",
            "List base tables in a schema (default public).",
            serde_json::json!({
                "type": "object",
                "properties": {"schema": {"type": "string"}},
            }),
        ),
        descriptor(
            "describe_table",
            "Describe a table's columns in ordinal order.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "table_name": {"type": "string"},
                    "schema": {"type": "string"},
                },
                "required": ["table_name"],
            }),
        ),
        descriptor(
            "list_schemas",
            "List user schemas, excluding system catalogs.",
            empty_object_schema(),
        ),
        descriptor(
            "get_sales_funnel_context",
            "Return the sales-funnel intelligence document: rules, date filters, stages, metrics, source mapping, status logic, anti-patterns, validation checklist.",
            empty_object_schema(),
        ),
        descriptor(
            "classify_sales_intent",
            "Classify a natural-language question into matching query patterns, date filter, and applicable rules.",
            serde_json::json!({
                "type": "object",
                "properties": {"question": {"type": "string"}},
                "required": ["question"],
            }),
        ),
        descriptor(
            "get_query_template",
            "Return the full rule package for a named query pattern.",
            serde_json::json!({
                "type": "object",
                "properties": {"pattern_name": {"type": "string"}},
                "required": ["pattern_name"],
            }),
        ),
        descriptor(
            "list_query_patterns",
            "Summary list of all funnel query patterns with descriptions and keywords.",
            empty_object_schema(),
        ),
        descriptor(
            "analyze_query",
            "Regex-based structural analysis of a SQL query (tables, joins, CTEs, date filters, exclusions, structure tag, etc).",
            serde_json::json!({
                "type": "object",
                "properties": {"sql": {"type": "string"}},
                "required": ["sql"],
            }),
        ),
        descriptor(
            "generate_rules",
            "Generate a YAML rules fragment, tool descriptor, and code snippet from a SQL query.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "sql": {"type": "string"},
                    "pattern_name": {"type": "string"},
                    "description": {"type": "string"},
                    "category": {"type": "string"},
                    "intent_keywords": {"type": "array", "items": {"type": "string"}},
                },
                "required": ["sql", "pattern_name", "description", "category"],
            }),
        ),
        descriptor(
            "fetch_redash_query",
            "Fetch one or more BI queries by id (comma/whitespace separated) and return per-id success or error.",
            serde_json::json!({
                "type": "object",
                "properties": {"query_ids": {"type": "string"}},
                "required": ["query_ids"],
            }),
        ),
        descriptor(
            "generate_rules_from_redash",
            "Fetch BI queries by id and generate rules for each (fetch_redash_query + generate_rules composed).",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "query_ids": {"type": "string"},
                    "category": {"type": "string"},
                    "intent_keywords": {"type": "array", "items": {"type": "string"}},
                },
                "required": ["query_ids"],
            }),
        ),
    ]
}

pub struct ToolCatalog {
    descriptors: Vec<ToolDescriptor>,
    acl: Arc<AclEngine>,
    pool: Arc<RelationalPool>,
    bi_config: BiConfig,
    http: reqwest::Client,
}

impl ToolCatalog {
    pub fn new(pool: Arc<RelationalPool>, acl: Arc<AclEngine>, bi_config: BiConfig) -> Self {
        Self {
            descriptors: tool_descriptors(),
            acl,
            pool,
            bi_config,
            http: reqwest::Client::new(),
        }
    }

    /// All ten descriptors, unfiltered; `sa-mcp-server`'s `list_tools`
    /// narrows this per caller via [`AclEngine::filter_tools`].
    pub fn descriptors(&self) -> &[ToolDescriptor] {
        &self.descriptors
    }

    /// Dispatch a call by name: ACL check, then input validation, then
    /// the handler body, with every failure captured as an `isError`
    /// result rather than propagated (§4.D).
    pub async fn dispatch(&self, name: &str, arguments: Value, email: Option<&str>) -> ToolCallResult {
        let decision = match self.acl.check_tool_access(name, email).await {
            Ok(d) => d,
            Err(e) => return ToolCallResult::error(e.to_mcp_message()),
        };
        if !decision.allowed {
            return ToolCallResult::error(decision.reason);
        }

        match self.run(name, arguments).await {
            Ok(result) => result,
            Err(e) => ToolCallResult::error(e.to_mcp_message()),
        }
    }

    async fn run(&self, name: &str, arguments: Value) -> sa_domain::error::Result<ToolCallResult> {
        match name {
            "query" => {
                let sql = require_str(&arguments, "sql")?;
                let params = arguments
                    .get("params")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                let result = sql_introspect::query(&self.pool, sql, &params).await?;
                Ok(ToolCallResult::text(serde_json::to_string(&serde_json::json!({
                    "rowCount": result.row_count,
                    "rows": result.rows,
                }))?))
            }
            "list_tables" => {
                let schema = arguments.get("schema").and_then(Value::as_str);
                let result = sql_introspect::list_tables(&self.pool, schema).await?;
                Ok(ToolCallResult::text(serde_json::to_string(&result_as_json(&result))?))
            }
            "describe_table" => {
                let table_name = require_str(&arguments, "table_name")?;
                let schema = arguments.get("schema").and_then(Value::as_str);
                let result = sql_introspect::describe_table(&self.pool, table_name, schema).await?;
                Ok(ToolCallResult::text(serde_json::to_string(&result_as_json(&result))?))
            }
            "list_schemas" => {
                let result = sql_introspect::list_schemas(&self.pool).await?;
                Ok(ToolCallResult::text(serde_json::to_string(&result_as_json(&result))?))
            }
            "get_sales_funnel_context" => {
                Ok(ToolCallResult::text(serde_json::to_string(&funnel::get_sales_funnel_context())?))
            }
            "classify_sales_intent" => {
                let question = require_str(&arguments, "question")?;
                let classification = funnel::classify_sales_intent(question);
                Ok(ToolCallResult::text(serde_json::to_string(&classification)?))
            }
            "get_query_template" => {
                let pattern_name = require_str(&arguments, "pattern_name")?;
                let template = funnel::get_query_template(pattern_name)?;
                Ok(ToolCallResult::text(serde_json::to_string(&template)?))
            }
            "list_query_patterns" => {
                Ok(ToolCallResult::text(serde_json::to_string(&funnel::list_query_patterns())?))
            }
            "analyze_query" => {
                let sql = require_str(&arguments, "sql")?;
                let analysis = analyzer::analyze_query(sql);
                Ok(ToolCallResult::text(serde_json::to_string(&analysis)?))
            }
            "generate_rules" => {
                let sql = require_str(&arguments, "sql")?;
                let pattern_name = require_str(&arguments, "pattern_name")?;
                let description = require_str(&arguments, "description")?;
                let category = require_str(&arguments, "category")?;
                let intent_keywords = string_array(&arguments, "intent_keywords");
                let generated = generator::generate_rules(sql, pattern_name, description, category, intent_keywords)?;
                Ok(ToolCallResult::text(serde_json::to_string(&generated)?))
            }
            "fetch_redash_query" => {
                let query_ids = require_str(&arguments, "query_ids")?;
                let outcomes = redash::fetch_redash_query(&self.http, &self.bi_config, query_ids).await?;
                Ok(ToolCallResult::text(serde_json::to_string(&outcomes)?))
            }
            "generate_rules_from_redash" => {
                let query_ids = require_str(&arguments, "query_ids")?;
                let category = arguments.get("category").and_then(Value::as_str).map(str::to_string);
                let intent_keywords = string_array(&arguments, "intent_keywords");
                let results = redash::generate_rules_from_redash(
                    &self.http,
                    &self.bi_config,
                    query_ids,
                    category,
                    intent_keywords,
                )
                .await?;
                Ok(ToolCallResult::text(serde_json::to_string(&results)?))
            }
            other => Err(sa_domain::error::Error::NotFound(format!("unknown tool '{other}'"))),
        }
    }
}

fn require_str<'a>(arguments: &'a Value, field: &str) -> sa_domain::error::Result<&'a str> {
    arguments
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| sa_domain::error::Error::ValidationError(format!("'{field}' is required")))
}

fn string_array(arguments: &Value, field: &str) -> Option<Vec<String>> {
    arguments.get(field).and_then(Value::as_array).map(|arr| {
        arr.iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect()
    })
}

fn result_as_json(result: &sa_db::QueryResult) -> Value {
    serde_json::json!({"rowCount": result.row_count, "rows": result.rows})
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_descriptors_cover_every_catalog_tool() {
        let names: Vec<&str> = tool_descriptors().iter().map(|d| d.name.as_str()).collect();
        for expected in [
            "query",
            "list_tables",
            "describe_table",
            "list_schemas",
            "get_sales_funnel_context",
            "classify_sales_intent",
            "get_query_template",
            "list_query_patterns",
            "analyze_query",
            "generate_rules",
            "fetch_redash_query",
            "generate_rules_from_redash",
        ] {
            assert!(names.contains(&expected), "missing tool descriptor: {expected}");
        }
    }

    #[test]
    fn require_str_rejects_missing_field() {
        let err = require_str(&serde_json::json!({}), "sql").unwrap_err();
        assert!(matches!(err, sa_domain::error::Error::ValidationError(_)));
    }
}
