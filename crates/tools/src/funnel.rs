//! Sales-funnel reference data (§4.D.3-6) — `get_sales_funnel_context`,
//! `classify_sales_intent`, `get_query_template`, `list_query_patterns`.
//!
//! The nine funnel patterns, core rules, date-filter templates and
//! keyword groups are declarative data embedded via `include_str!`
//! (`assets/funnel_patterns.yaml`), not hand-built Rust literals, so the
//! catalog can be extended without touching code.

use std::collections::HashMap;
use std::sync::OnceLock;

use sa_domain::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const FUNNEL_YAML: &str = include_str!("../assets/funnel_patterns.yaml");

#[derive(Debug, Clone, Deserialize)]
struct CoreRule {
    id: String,
    text: String,
}

#[derive(Debug, Clone, Deserialize)]
struct DateFilter {
    name: String,
    sql: String,
    description: String,
}

#[derive(Debug, Clone, Deserialize)]
struct SourceMapping {
    case_expression: String,
    mapping: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
struct StatusLogic {
    open_statuses: Vec<String>,
    closed_won: Vec<String>,
    closed_lost: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct Stage {
    name: String,
    description: String,
}

#[derive(Debug, Clone, Deserialize)]
struct Metric {
    name: String,
    description: String,
}

#[derive(Debug, Clone, Deserialize)]
struct KeywordGroups {
    time_period: Vec<String>,
    metric: Vec<String>,
    granularity: Vec<String>,
    filter: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueryPattern {
    pub name: String,
    pub description: String,
    pub category: String,
    pub keywords: Vec<String>,
    #[serde(default)]
    pub required: bool,
    pub tables: Vec<String>,
    pub rules: Vec<String>,
    pub date_filter: Option<String>,
    pub validation_checks: Vec<String>,
    pub special_logic: Option<String>,
    pub template: String,
}

#[derive(Debug, Clone, Deserialize)]
struct FunnelDocument {
    core_rules: Vec<CoreRule>,
    date_filters: HashMap<String, DateFilter>,
    source_mapping: SourceMapping,
    status_logic: StatusLogic,
    stages: Vec<Stage>,
    metrics: Vec<Metric>,
    anti_patterns: Vec<String>,
    validation_checklist: Vec<String>,
    default_pattern: String,
    keyword_groups: KeywordGroups,
    patterns: Vec<QueryPattern>,
}

fn document() -> &'static FunnelDocument {
    static DOC: OnceLock<FunnelDocument> = OnceLock::new();
    DOC.get_or_init(|| {
        serde_yaml::from_str(FUNNEL_YAML).expect("assets/funnel_patterns.yaml must parse")
    })
}

/// `get_sales_funnel_context()` (§4.D.3) — the combined intelligence
/// document: core rules, date-filter templates, stages, metrics, source
/// mapping, status logic, anti-patterns, validation checklist, and the
/// set of tables referenced by any pattern.
pub fn get_sales_funnel_context() -> Value {
    let doc = document();
    let mut tables: Vec<String> = doc
        .patterns
        .iter()
        .flat_map(|p| p.tables.iter().cloned())
        .collect();
    tables.sort();
    tables.dedup();

    serde_json::json!({
        "coreRules": doc.core_rules.iter().map(|r| serde_json::json!({"id": r.id, "text": r.text})).collect::<Vec<_>>(),
        "dateFilters": doc.date_filters.iter().map(|(k, v)| serde_json::json!({
            "key": k, "name": v.name, "sql": v.sql, "description": v.description,
        })).collect::<Vec<_>>(),
        "stages": doc.stages.iter().map(|s| serde_json::json!({"name": s.name, "description": s.description})).collect::<Vec<_>>(),
        "metrics": doc.metrics.iter().map(|m| serde_json::json!({"name": m.name, "description": m.description})).collect::<Vec<_>>(),
        "sourceMapping": {
            "caseExpression": doc.source_mapping.case_expression,
            "mapping": doc.source_mapping.mapping,
        },
        "statusLogic": {
            "openStatuses": doc.status_logic.open_statuses,
            "closedWon": doc.status_logic.closed_won,
            "closedLost": doc.status_logic.closed_lost,
        },
        "antiPatterns": doc.anti_patterns,
        "validationChecklist": doc.validation_checklist,
        "referencedTables": tables,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct IntentClassification {
    pub suggested_categories: Vec<String>,
    pub required_patterns: Vec<String>,
    pub date_filter: Option<String>,
    pub matched_patterns: Vec<QueryPattern>,
    pub core_rules: Vec<String>,
    pub validation_checks: Vec<String>,
}

/// `classify_sales_intent(question)` (§4.D.4).
pub fn classify_sales_intent(question: &str) -> IntentClassification {
    let doc = document();
    let lowered = question.to_lowercase();
    let tokens: Vec<&str> = lowered.split_whitespace().collect();

    let score_group = |keywords: &[String]| -> usize {
        keywords
            .iter()
            .filter(|kw| {
                if kw.contains(' ') {
                    lowered.contains(kw.as_str())
                } else {
                    tokens.iter().any(|t| t.trim_matches(|c: char| !c.is_alphanumeric()) == kw.as_str())
                }
            })
            .count()
    };

    let time_score = score_group(&doc.keyword_groups.time_period);
    let metric_score = score_group(&doc.keyword_groups.metric);
    let granularity_score = score_group(&doc.keyword_groups.granularity);
    let filter_score = score_group(&doc.keyword_groups.filter);

    let mut suggested_categories = Vec::new();
    if metric_score > 0 {
        suggested_categories.push("conversion".to_string());
    }
    if granularity_score > 0 {
        suggested_categories.push("breakdown".to_string());
    }
    if time_score > 0 && metric_score == 0 && granularity_score == 0 {
        suggested_categories.push("trend".to_string());
    }
    if suggested_categories.is_empty() && filter_score == 0 {
        suggested_categories.push("volume".to_string());
    }
    suggested_categories.sort();
    suggested_categories.dedup();

    let date_filter = if time_score > 0 {
        if lowered.contains("year") || lowered.contains("yoy") {
            Some("prior_year_mtd".to_string())
        } else if lowered.contains("trailing") || lowered.contains("quarter") {
            Some("trailing_3_months".to_string())
        } else {
            Some("mtd_current".to_string())
        }
    } else {
        None
    };

    let required_patterns: Vec<String> = doc
        .patterns
        .iter()
        .filter(|p| p.required)
        .map(|p| p.name.clone())
        .collect();

    let keyword_overlap: Vec<&QueryPattern> = doc
        .patterns
        .iter()
        .filter(|p| p.keywords.iter().any(|kw| lowered.contains(kw.as_str())))
        .collect();

    let category_matched: Vec<&QueryPattern> = doc
        .patterns
        .iter()
        .filter(|p| suggested_categories.contains(&p.category))
        .collect();

    let mut matched: Vec<QueryPattern> = Vec::new();
    let mut seen = std::collections::HashSet::new();
    for p in doc.patterns.iter().filter(|p| p.required) {
        if seen.insert(p.name.clone()) {
            matched.push(p.clone());
        }
    }
    for p in category_matched.into_iter().chain(keyword_overlap) {
        if seen.insert(p.name.clone()) {
            matched.push(p.clone());
        }
    }

    if matched.is_empty() {
        if let Some(default) = doc.patterns.iter().find(|p| p.name == doc.default_pattern) {
            matched.push(default.clone());
        }
    }

    let core_rules: Vec<String> = {
        let mut set = std::collections::BTreeSet::new();
        for p in &matched {
            for r in &p.rules {
                set.insert(r.clone());
            }
        }
        set.into_iter().collect()
    };

    let validation_checks: Vec<String> = {
        let mut set = std::collections::BTreeSet::new();
        for p in &matched {
            for v in &p.validation_checks {
                set.insert(v.clone());
            }
        }
        set.into_iter().collect()
    };

    IntentClassification {
        suggested_categories,
        required_patterns,
        date_filter,
        matched_patterns: matched,
        core_rules,
        validation_checks,
    }
}

/// Dereferences a dotted key path like `source_mapping.case_expression`
/// against the funnel document, for `get_query_template`'s "special
/// logic" field.
fn dereference_special_logic(path: &str) -> Option<Value> {
    let doc = document();
    let root = serde_json::to_value(doc).ok()?;
    let mut current = &root;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current.clone())
}

/// `get_query_template(pattern_name)` (§4.D.5).
pub fn get_query_template(pattern_name: &str) -> Result<Value> {
    let doc = document();
    let pattern = doc
        .patterns
        .iter()
        .find(|p| p.name == pattern_name)
        .ok_or_else(|| Error::NotFound(format!("no query pattern named '{pattern_name}'")))?;

    let date_filter = pattern
        .date_filter
        .as_ref()
        .and_then(|key| doc.date_filters.get(key))
        .map(|f| serde_json::json!({"key": pattern.date_filter, "name": f.name, "sql": f.sql, "description": f.description}));

    let rules: Vec<&str> = pattern
        .rules
        .iter()
        .filter_map(|id| doc.core_rules.iter().find(|r| &r.id == id))
        .map(|r| r.text.as_str())
        .collect();

    let special_logic = pattern
        .special_logic
        .as_ref()
        .and_then(|path| dereference_special_logic(path));

    Ok(serde_json::json!({
        "name": pattern.name,
        "description": pattern.description,
        "category": pattern.category,
        "tables": pattern.tables,
        "template": pattern.template,
        "rules": rules,
        "dateFilter": date_filter,
        "stages": doc.stages.iter().map(|s| serde_json::json!({"name": s.name, "description": s.description})).collect::<Vec<_>>(),
        "metrics": doc.metrics.iter().map(|m| serde_json::json!({"name": m.name, "description": m.description})).collect::<Vec<_>>(),
        "sourceMapping": {
            "caseExpression": doc.source_mapping.case_expression,
            "mapping": doc.source_mapping.mapping,
        },
        "statusLogic": {
            "openStatuses": doc.status_logic.open_statuses,
            "closedWon": doc.status_logic.closed_won,
            "closedLost": doc.status_logic.closed_lost,
        },
        "validationChecks": pattern.validation_checks,
        "specialLogic": special_logic,
        "antiPatterns": doc.anti_patterns,
    }))
}

#[derive(Debug, Clone, Serialize)]
pub struct PatternSummary {
    pub name: String,
    pub description: String,
    pub category: String,
    pub keywords: Vec<String>,
}

/// `list_query_patterns()` (§4.D.6).
pub fn list_query_patterns() -> Vec<PatternSummary> {
    document()
        .patterns
        .iter()
        .map(|p| PatternSummary {
            name: p.name.clone(),
            description: p.description.clone(),
            category: p.category.clone(),
            keywords: p.keywords.clone(),
        })
        .collect()
}

/// Look a pattern up by name without the §4.D.5 shaping. Used by
/// `generate_rules` (§4.D.8) to carry a matching pattern's validation
/// checks into the generated rules document.
pub(crate) fn find_pattern(name: &str) -> Option<QueryPattern> {
    document().patterns.iter().find(|p| p.name == name).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_parses_nine_patterns() {
        assert_eq!(document().patterns.len(), 9);
    }

    #[test]
    fn get_query_template_dereferences_special_logic() {
        let result = get_query_template("lead_volume_by_source").unwrap();
        assert!(result["specialLogic"].is_string());
    }

    #[test]
    fn get_query_template_unknown_pattern_is_not_found() {
        let err = get_query_template("does_not_exist").unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn classify_sales_intent_falls_back_to_default() {
        let result = classify_sales_intent("asdkfj qwoeiru");
        assert_eq!(result.matched_patterns.len(), 1);
        assert_eq!(result.matched_patterns[0].name, "lead_volume_by_source");
    }

    #[test]
    fn classify_sales_intent_detects_conversion_and_date_filter() {
        let result = classify_sales_intent("what is our lead to prospect conversion rate this month");
        assert!(result.matched_patterns.iter().any(|p| p.name == "lead_to_prospect_conversion"));
        assert_eq!(result.date_filter.as_deref(), Some("mtd_current"));
    }

    #[test]
    fn list_query_patterns_returns_all_nine() {
        assert_eq!(list_query_patterns().len(), 9);
    }
}
