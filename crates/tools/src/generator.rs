//! The rule generator (§4.D.8, detail in §4.J's last paragraph):
//! consumes [`crate::analyzer::analyze_query`]'s output and emits three
//! deterministic artifacts — a YAML rules fragment, a tool descriptor,
//! and a code snippet embedding the SQL verbatim.

use sa_domain::error::{Error, Result};
use serde::Serialize;
use serde_json::{json, Value};

use crate::analyzer::{self, SqlAnalysis};
use crate::funnel;

/// Field order here is the YAML key order — `serde_yaml` serializes
/// structs field-by-field, so the law in §8 ("stable key order … depends
/// only on `analyze_query(Q)` and the provided metadata") holds as long
/// as this struct's fields never get reordered.
#[derive(Debug, Serialize)]
struct RulesDocument {
    pattern_name: String,
    description: String,
    category: String,
    intent_keywords: Vec<String>,
    structure: String,
    tables: Vec<String>,
    joins: Vec<String>,
    ctes: Vec<String>,
    date_filters: Vec<String>,
    exclusions: Vec<String>,
    aggregations: Vec<String>,
    sql: String,
    /// Validation checks carried over from the matching funnel pattern
    /// (§4.D.3), when `pattern_name` names one — empty otherwise.
    known_pattern_validation_checks: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneratedRules {
    pub yaml_rules: String,
    pub tool_descriptor: Value,
    pub code_snippet: String,
}

fn build_tool_descriptor(
    pattern_name: &str,
    description: &str,
    analysis: &SqlAnalysis,
) -> Value {
    let mut properties = serde_json::Map::new();
    properties.insert(
        "limit".to_string(),
        json!({"type": "integer", "description": "Maximum rows to return", "minimum": 1}),
    );

    if !analysis.date_filters.is_empty() {
        properties.insert(
            "start_date".to_string(),
            json!({"type": "string", "format": "date", "description": "Inclusive window start"}),
        );
        properties.insert(
            "end_date".to_string(),
            json!({"type": "string", "format": "date", "description": "Exclusive window end"}),
        );
    }

    if !analysis.exclusions.is_empty() {
        properties.insert(
            "exclude".to_string(),
            json!({"type": "array", "items": {"type": "string"}, "description": "Values to exclude"}),
        );
    }

    json!({
        "name": pattern_name,
        "description": description,
        "inputSchema": {
            "type": "object",
            "properties": Value::Object(properties),
            "required": ["limit"],
        },
    })
}

fn build_code_snippet(pattern_name: &str, sql: &str) -> String {
    format!(
        "pub const {}_SQL: &str = r#\"\n{}\n\"#;\n",
        pattern_name.to_uppercase(),
        sql.trim()
    )
}

/// `generate_rules(sql, pattern_name, description, category,
/// intent_keywords?)` (§4.D.8).
pub fn generate_rules(
    sql: &str,
    pattern_name: &str,
    description: &str,
    category: &str,
    intent_keywords: Option<Vec<String>>,
) -> Result<GeneratedRules> {
    let analysis = analyzer::analyze_query(sql);
    let known_pattern_validation_checks = funnel::find_pattern(pattern_name)
        .map(|p| p.validation_checks)
        .unwrap_or_default();

    let doc = RulesDocument {
        pattern_name: pattern_name.to_string(),
        description: description.to_string(),
        category: category.to_string(),
        intent_keywords: intent_keywords.unwrap_or_default(),
        structure: analysis.structure.clone(),
        tables: analysis.tables.iter().map(|t| t.name.clone()).collect(),
        joins: analysis
            .joins
            .iter()
            .map(|j| format!("{} JOIN {} ON {}", j.join_type, j.table, j.on_clauses.join(" AND ")))
            .collect(),
        ctes: analysis.ctes.iter().map(|c| c.name.clone()).collect(),
        date_filters: analysis.date_filters.iter().map(|f| f.pattern.clone()).collect(),
        exclusions: analysis
            .exclusions
            .iter()
            .map(|e| format!("{}:{}", e.kind, e.column))
            .collect(),
        aggregations: analysis
            .aggregations
            .iter()
            .map(|a| a.function.clone())
            .collect(),
        sql: sql.to_string(),
        known_pattern_validation_checks,
    };

    let yaml_rules = serde_yaml::to_string(&doc)
        .map_err(|e| Error::Other(format!("rule generation failed: {e}")))?;
    let tool_descriptor = build_tool_descriptor(pattern_name, description, &analysis);
    let code_snippet = build_code_snippet(pattern_name, sql);

    Ok(GeneratedRules {
        yaml_rules,
        tool_descriptor,
        code_snippet,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_rules_is_deterministic_for_same_input() {
        let sql = "SELECT * FROM leads WHERE created_at >= '2024-01-01'";
        let a = generate_rules(sql, "p", "d", "volume", None).unwrap();
        let b = generate_rules(sql, "p", "d", "volume", None).unwrap();
        assert_eq!(a.yaml_rules, b.yaml_rules);
        assert_eq!(a.code_snippet, b.code_snippet);
    }

    #[test]
    fn tool_descriptor_adds_date_params_only_when_filters_present() {
        let with_date = generate_rules(
            "SELECT * FROM t WHERE created_at >= date_trunc('month', CURRENT_DATE)",
            "p",
            "d",
            "volume",
            None,
        )
        .unwrap();
        let props = &with_date.tool_descriptor["inputSchema"]["properties"];
        assert!(props.get("start_date").is_some());

        let without_date = generate_rules("SELECT * FROM t", "p", "d", "volume", None).unwrap();
        let props = &without_date.tool_descriptor["inputSchema"]["properties"];
        assert!(props.get("start_date").is_none());
    }

    #[test]
    fn code_snippet_embeds_sql_verbatim() {
        let result = generate_rules("SELECT 1", "p", "d", "volume", None).unwrap();
        assert!(result.code_snippet.contains("SELECT 1"));
    }

    #[test]
    fn yaml_carries_known_pattern_validation_checks() {
        let unknown = generate_rules("SELECT 1", "not_a_real_pattern", "d", "volume", None).unwrap();
        assert!(unknown.yaml_rules.contains("known_pattern_validation_checks: []"));

        let known = generate_rules("SELECT 1", "lead_volume_by_source", "d", "volume", None).unwrap();
        assert!(!known.yaml_rules.contains("known_pattern_validation_checks: []"));
    }
}
