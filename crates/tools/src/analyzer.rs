//! The SQL analyzer (SPEC_FULL.md §4.J) — a deliberately regex-based
//! pattern extractor, not a SQL parser (§9 "Regex-based SQL analysis is
//! tolerated as a deliberate design choice"). Every dimension documented
//! in §4.J is reproduced here; nested parens are handled by the balanced-
//! paren scanner ([`scan_balanced`]), never a flat regex.

use regex::Regex;
use serde::Serialize;

/// A reference to a table introduced by `FROM` or `JOIN`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TableRef {
    pub name: String,
    pub alias: Option<String>,
    pub role: String, // "from" | "join"
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct JoinInfo {
    pub join_type: String,
    pub table: String,
    pub alias: Option<String>,
    pub on_clauses: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CteInfo {
    pub name: String,
    pub body: String,
    pub tables: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AggregationInfo {
    pub function: String,
    pub distinct: bool,
    pub expression: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DateFilterInfo {
    pub column: Option<String>,
    pub pattern: String, // mtd_current | trailing_months | fixed_start | prior_year_mtd
    pub source: String,
    pub has_timezone: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TimezoneConversion {
    pub column: String,
    pub bucket: String, // 330_minutes | 5h30m | other
    pub source: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ExclusionInfo {
    pub kind: String, // not_in | not_equal | not_like
    pub column: String,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CaseBlock {
    pub when_then: Vec<(String, String)>,
    pub else_branch: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct WindowFunction {
    pub function: String,
    pub partition_by: Option<String>,
    pub order_by: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq, Default)]
pub struct SqlAnalysis {
    pub tables: Vec<TableRef>,
    pub joins: Vec<JoinInfo>,
    pub ctes: Vec<CteInfo>,
    pub aggregations: Vec<AggregationInfo>,
    pub date_filters: Vec<DateFilterInfo>,
    pub timezone_conversions: Vec<TimezoneConversion>,
    pub progressive_day_filters: Vec<String>,
    pub exclusions: Vec<ExclusionInfo>,
    pub case_blocks: Vec<CaseBlock>,
    pub status_conditions: Vec<String>,
    pub has_union: bool,
    pub window_functions: Vec<WindowFunction>,
    pub jsonb_ops: Vec<String>,
    pub distinct_counts: usize,
    pub positional_params: Vec<String>,
    pub structure: String,
}

/// SQL keywords that must never be mistaken for a table identifier
/// (§4.J "identifiers that are SQL keywords (curated list) are filtered
/// out").
const KEYWORD_BLOCKLIST: &[&str] = &[
    "SELECT", "WHERE", "GROUP", "ORDER", "HAVING", "LIMIT", "OFFSET", "ON", "AS", "AND", "OR",
    "NOT", "IN", "IS", "NULL", "UNION", "ALL", "DISTINCT", "LEFT", "RIGHT", "INNER", "OUTER",
    "CROSS", "JOIN",
];

fn is_keyword(ident: &str) -> bool {
    KEYWORD_BLOCKLIST.iter().any(|k| k.eq_ignore_ascii_case(ident))
}

/// Scan forward from `open_idx` (which must point at `(`) to the index
/// just past the matching `)`, honoring nesting. Returns `None` if
/// unbalanced.
pub fn scan_balanced(s: &str, open_idx: usize) -> Option<usize> {
    let bytes = s.as_bytes();
    if bytes.get(open_idx) != Some(&b'(') {
        return None;
    }
    let mut depth = 0i32;
    for (i, &b) in bytes.iter().enumerate().skip(open_idx) {
        match b {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

mod regexes {
    use regex::Regex;
    use std::sync::OnceLock;

    macro_rules! lazy_re {
        ($name:ident, $pat:expr) => {
            pub fn $name() -> &'static Regex {
                static RE: OnceLock<Regex> = OnceLock::new();
                RE.get_or_init(|| Regex::new($pat).unwrap())
            }
        };
    }

    lazy_re!(
        from_table,
        r"(?i)\bFROM\s+([a-zA-Z_][\w\.]*)\s*(?:AS\s+)?([a-zA-Z_]\w*)?"
    );
    lazy_re!(
        join_clause,
        r"(?i)\b(LEFT|RIGHT|INNER|CROSS)?\s*JOIN\s+([a-zA-Z_][\w\.]*)\s*(?:AS\s+)?([a-zA-Z_]\w*)?\s+ON\b"
    );
    lazy_re!(cte_name, r"(?i)([a-zA-Z_]\w*)\s+AS\s*\(");
    lazy_re!(
        aggregation,
        r"(?i)\b(COUNT|SUM|AVG|MIN|MAX)\s*\(\s*(DISTINCT\s+)?([^)]*)\)"
    );
    lazy_re!(
        mtd_current,
        r"(?i)date_trunc\(\s*'month'\s*,\s*CURRENT_DATE\s*\)"
    );
    lazy_re!(
        trailing_months,
        r"(?i)date_trunc\(\s*'month'\s*,\s*CURRENT_DATE\s*\)\s*-\s*interval\s*'(\d+)\s*months?'"
    );
    lazy_re!(
        fixed_start,
        r"(?i)([a-zA-Z_][\w\.]*)\s*>=\s*'(\d{4}-\d{2}-\d{2})'"
    );
    lazy_re!(prior_year, r"(?i)CURRENT_DATE\s*-\s*interval\s*'1\s*year'");
    lazy_re!(
        tz_conversion,
        r"(?i)([a-zA-Z_][\w\.]*)\s*\+\s*interval\s*'([^']+)'"
    );
    lazy_re!(
        progressive_day,
        r"(?i)EXTRACT\(\s*DAY\s+FROM\s+[^)]*\)\s*(=|<=)\s*EXTRACT\(\s*DAY\s+FROM\s+CURRENT_DATE\s*\)"
    );
    lazy_re!(
        not_in,
        r"(?i)([a-zA-Z_][\w\.]*)\s+NOT\s+IN\s*\(([^)]*)\)"
    );
    lazy_re!(not_equal, r"(?i)([a-zA-Z_][\w\.]*)\s*!=\s*'([^']*)'");
    lazy_re!(not_like, r"(?i)([a-zA-Z_][\w\.]*)\s+NOT\s+LIKE\s*'([^']*)'");
    lazy_re!(case_when, r"(?is)CASE\s+(.*?)\s*END\b");
    lazy_re!(when_then, r"(?i)WHEN\s+(.*?)\s+THEN\s+([^\s]+(?:\s+[^\s]+)*?)(?=\s+WHEN|\s+ELSE|$)");
    lazy_re!(else_branch, r"(?i)ELSE\s+(.+)$");
    lazy_re!(status_condition, r"(?i)\bstatus\s*(=|IN|<>|!=)\s*[^,\)]+");
    lazy_re!(window_function, r"(?i)(\w+)\s*\(\s*\)\s*OVER\s*\(([^)]*)\)");
    lazy_re!(jsonb_op, r"(\w+)\s*(->>?|#>>?)\s*'([^']+)'");
    lazy_re!(distinct_count, r"(?i)COUNT\s*\(\s*DISTINCT\b");
    lazy_re!(positional_param, r"\$(\d+)");
}

/// Table/join extraction (§4.J first bullet).
fn extract_tables_and_joins(sql: &str) -> (Vec<TableRef>, Vec<JoinInfo>) {
    let mut tables = Vec::new();
    for cap in regexes::from_table().captures_iter(sql) {
        let name = cap.get(1).map(|m| m.as_str().to_string()).unwrap_or_default();
        if name.is_empty() || is_keyword(&name) {
            continue;
        }
        let alias = cap
            .get(2)
            .map(|m| m.as_str().to_string())
            .filter(|a| !a.is_empty() && !is_keyword(a));
        tables.push(TableRef {
            name,
            alias,
            role: "from".into(),
        });
    }

    let mut joins = Vec::new();
    for cap in regexes::join_clause().captures_iter(sql) {
        let join_type = cap
            .get(1)
            .map(|m| m.as_str().to_uppercase())
            .unwrap_or_else(|| "INNER".to_string());
        let table = cap.get(2).map(|m| m.as_str().to_string()).unwrap_or_default();
        if table.is_empty() || is_keyword(&table) {
            continue;
        }
        let alias = cap
            .get(3)
            .map(|m| m.as_str().to_string())
            .filter(|a| !a.is_empty() && !is_keyword(a));

        let on_start = cap.get(0).unwrap().end();
        let on_clause = extract_on_clause(&sql[on_start..]);
        let on_clauses = split_on_and(&on_clause);

        tables.push(TableRef {
            name: table.clone(),
            alias: alias.clone(),
            role: "join".into(),
        });
        joins.push(JoinInfo {
            join_type,
            table,
            alias,
            on_clauses,
        });
    }

    (tables, joins)
}

/// Terminate an `ON` clause at the next join keyword or a block
/// terminator (§4.J "Join extraction").
fn extract_on_clause(rest: &str) -> String {
    let terminators = [
        "WHERE", "GROUP", "ORDER", "LIMIT", "UNION", "HAVING", "JOIN", ")",
    ];
    let upper = rest.to_uppercase();
    let mut end = rest.len();
    for term in terminators {
        if let Some(idx) = upper.find(term) {
            end = end.min(idx);
        }
    }
    rest[..end].trim().to_string()
}

fn split_on_and(on_clause: &str) -> Vec<String> {
    static AND_RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    let re = AND_RE.get_or_init(|| Regex::new(r"(?i)\s+AND\s+").unwrap());
    re.split(on_clause)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// CTE extraction (§4.J): find `WITH` once, iterate `name AS (` then a
/// balanced-paren scan for each body.
fn extract_ctes(sql: &str) -> Vec<CteInfo> {
    let upper = sql.to_uppercase();
    let Some(with_idx) = upper.find("WITH") else {
        return Vec::new();
    };
    // Require a word boundary before/after "WITH".
    if with_idx > 0 && upper.as_bytes()[with_idx - 1].is_ascii_alphanumeric() {
        return Vec::new();
    }

    let mut ctes = Vec::new();
    let mut cursor = with_idx;
    // Stop scanning for more CTE names once we hit the final SELECT that
    // consumes them (heuristic: stop at the first top-level SELECT after
    // all balanced bodies have been consumed is handled naturally since we
    // search `name AS (` patterns only within the remaining tail).
    loop {
        let tail = &sql[cursor..];
        let Some(cap) = regexes::cte_name().captures(tail) else {
            break;
        };
        let name = cap.get(1).unwrap().as_str().to_string();
        if is_keyword(&name) {
            break;
        }
        let open_rel = tail.find('(').unwrap_or(0);
        // cte_name regex match already ends right after '(', compute its
        // absolute index in `sql`.
        let match_end = cursor + cap.get(0).unwrap().end();
        let open_idx = match_end - 1; // the '(' the regex consumed
        let Some(close_idx) = scan_balanced(sql, open_idx) else {
            break;
        };
        let body = sql[open_idx + 1..close_idx - 1].to_string();
        let (body_tables, _) = extract_tables_and_joins(&body);
        ctes.push(CteInfo {
            name,
            body,
            tables: body_tables.into_iter().map(|t| t.name).collect(),
        });
        cursor = close_idx;
        let _ = open_rel;

        // Stop once we've passed a top-level SELECT that isn't immediately
        // followed by another ", name AS (" — i.e. no comma before the
        // next candidate.
        let remainder = sql[cursor..].trim_start();
        if !remainder.starts_with(',') {
            break;
        }
    }
    ctes
}

fn extract_aggregations(sql: &str) -> Vec<AggregationInfo> {
    regexes::aggregation()
        .captures_iter(sql)
        .map(|cap| AggregationInfo {
            function: cap.get(1).unwrap().as_str().to_uppercase(),
            distinct: cap.get(2).is_some(),
            expression: cap.get(3).map(|m| m.as_str().trim().to_string()).unwrap_or_default(),
        })
        .collect()
}

fn extract_date_filters(sql: &str) -> Vec<DateFilterInfo> {
    let mut out = Vec::new();
    if let Some(m) = regexes::trailing_months().find(sql) {
        out.push(DateFilterInfo {
            column: None,
            pattern: "trailing_months".into(),
            source: m.as_str().to_string(),
            has_timezone: sql.to_lowercase().contains("timezone"),
        });
    } else if let Some(m) = regexes::mtd_current().find(sql) {
        out.push(DateFilterInfo {
            column: None,
            pattern: "mtd_current".into(),
            source: m.as_str().to_string(),
            has_timezone: sql.to_lowercase().contains("timezone"),
        });
    }
    if let Some(cap) = regexes::fixed_start().captures(sql) {
        out.push(DateFilterInfo {
            column: cap.get(1).map(|m| m.as_str().to_string()),
            pattern: "fixed_start".into(),
            source: cap.get(0).unwrap().as_str().to_string(),
            has_timezone: false,
        });
    }
    if let Some(m) = regexes::prior_year().find(sql) {
        out.push(DateFilterInfo {
            column: None,
            pattern: "prior_year_mtd".into(),
            source: m.as_str().to_string(),
            has_timezone: false,
        });
    }
    out
}

fn extract_timezone_conversions(sql: &str) -> Vec<TimezoneConversion> {
    regexes::tz_conversion()
        .captures_iter(sql)
        .map(|cap| {
            let column = cap.get(1).unwrap().as_str().to_string();
            let literal = cap.get(2).unwrap().as_str().to_string();
            let bucket = classify_interval(&literal);
            TimezoneConversion {
                column,
                bucket,
                source: cap.get(0).unwrap().as_str().to_string(),
            }
        })
        .collect()
}

fn classify_interval(literal: &str) -> String {
    let lower = literal.to_lowercase();
    if lower.contains("330") && lower.contains("min") {
        "330_minutes".into()
    } else if (lower.contains("5") && lower.contains("hour")) || lower.contains("5h30m") {
        "5h30m".into()
    } else {
        "other".into()
    }
}

fn extract_progressive_day_filters(sql: &str) -> Vec<String> {
    regexes::progressive_day()
        .find_iter(sql)
        .map(|m| m.as_str().to_string())
        .collect()
}

fn extract_exclusions(sql: &str) -> Vec<ExclusionInfo> {
    let mut out = Vec::new();
    for cap in regexes::not_in().captures_iter(sql) {
        let column = cap.get(1).unwrap().as_str().to_string();
        let list = cap.get(2).unwrap().as_str();
        let values = extract_quoted_values(list);
        out.push(ExclusionInfo {
            kind: "not_in".into(),
            column,
            values,
        });
    }
    for cap in regexes::not_equal().captures_iter(sql) {
        out.push(ExclusionInfo {
            kind: "not_equal".into(),
            column: cap.get(1).unwrap().as_str().to_string(),
            values: vec![cap.get(2).unwrap().as_str().to_string()],
        });
    }
    for cap in regexes::not_like().captures_iter(sql) {
        out.push(ExclusionInfo {
            kind: "not_like".into(),
            column: cap.get(1).unwrap().as_str().to_string(),
            values: vec![cap.get(2).unwrap().as_str().to_string()],
        });
    }
    out
}

fn extract_quoted_values(list: &str) -> Vec<String> {
    static QUOTED: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    let re = QUOTED.get_or_init(|| Regex::new(r"'([^']*)'").unwrap());
    re.captures_iter(list)
        .map(|c| c.get(1).unwrap().as_str().to_string())
        .collect()
}

fn extract_case_blocks(sql: &str) -> Vec<CaseBlock> {
    regexes::case_when()
        .captures_iter(sql)
        .map(|cap| {
            let body = cap.get(1).unwrap().as_str();
            let when_then: Vec<(String, String)> = regexes::when_then()
                .captures_iter(body)
                .map(|c| {
                    (
                        c.get(1).unwrap().as_str().trim().to_string(),
                        c.get(2).unwrap().as_str().trim().to_string(),
                    )
                })
                .collect();
            let else_branch = regexes::else_branch()
                .captures(body)
                .map(|c| c.get(1).unwrap().as_str().trim().to_string());
            CaseBlock {
                when_then,
                else_branch,
            }
        })
        .collect()
}

fn extract_status_conditions(sql: &str) -> Vec<String> {
    regexes::status_condition()
        .find_iter(sql)
        .map(|m| m.as_str().trim().to_string())
        .collect()
}

fn extract_window_functions(sql: &str) -> Vec<WindowFunction> {
    regexes::window_function()
        .captures_iter(sql)
        .map(|cap| {
            let function = cap.get(1).unwrap().as_str().to_uppercase();
            let inner = cap.get(2).unwrap().as_str();
            let partition_by = extract_clause(inner, "PARTITION BY", "ORDER BY");
            let order_by = extract_clause(inner, "ORDER BY", "");
            WindowFunction {
                function,
                partition_by,
                order_by,
            }
        })
        .collect()
}

fn extract_clause(inner: &str, start_kw: &str, stop_kw: &str) -> Option<String> {
    let upper = inner.to_uppercase();
    let start = upper.find(start_kw)? + start_kw.len();
    let rest = &inner[start..];
    let rest_upper = &upper[start..];
    let end = if stop_kw.is_empty() {
        rest.len()
    } else {
        rest_upper.find(stop_kw).unwrap_or(rest.len())
    };
    let value = rest[..end].trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn extract_jsonb_ops(sql: &str) -> Vec<String> {
    regexes::jsonb_op()
        .find_iter(sql)
        .map(|m| m.as_str().to_string())
        .collect()
}

fn count_distinct(sql: &str) -> usize {
    regexes::distinct_count().find_iter(sql).count()
}

fn extract_positional_params(sql: &str) -> Vec<String> {
    let mut seen = std::collections::BTreeSet::new();
    for cap in regexes::positional_param().captures_iter(sql) {
        seen.insert(cap.get(1).unwrap().as_str().to_string());
    }
    seen.into_iter().map(|n| format!("${n}")).collect()
}

/// Structural tag: priority `cte_union > cte > union > multi_join >
/// single_table` (§4.J).
fn classify_structure(has_cte: bool, has_union: bool, join_count: usize) -> String {
    match (has_cte, has_union) {
        (true, true) => "cte_union".into(),
        (true, false) => "cte".into(),
        (false, true) => "union".into(),
        (false, false) if join_count > 0 => "multi_join".into(),
        _ => "single_table".into(),
    }
}

/// `analyze_query(sql)` (§4.D.7).
pub fn analyze_query(sql: &str) -> SqlAnalysis {
    let (tables, joins) = extract_tables_and_joins(sql);
    let ctes = extract_ctes(sql);
    let has_union = Regex::new(r"(?i)\bUNION\b").unwrap().is_match(sql);

    SqlAnalysis {
        structure: classify_structure(!ctes.is_empty(), has_union, joins.len()),
        aggregations: extract_aggregations(sql),
        date_filters: extract_date_filters(sql),
        timezone_conversions: extract_timezone_conversions(sql),
        progressive_day_filters: extract_progressive_day_filters(sql),
        exclusions: extract_exclusions(sql),
        case_blocks: extract_case_blocks(sql),
        status_conditions: extract_status_conditions(sql),
        window_functions: extract_window_functions(sql),
        jsonb_ops: extract_jsonb_ops(sql),
        distinct_counts: count_distinct(sql),
        positional_params: extract_positional_params(sql),
        has_union,
        tables,
        joins,
        ctes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_balanced_handles_nesting() {
        let s = "(a (b) c)rest";
        let end = scan_balanced(s, 0).unwrap();
        assert_eq!(&s[..end], "(a (b) c)");
    }

    #[test]
    fn structural_tag_cte_union() {
        let sql = "WITH a AS (SELECT 1) SELECT * FROM a UNION SELECT * FROM b";
        let analysis = analyze_query(sql);
        assert_eq!(analysis.structure, "cte_union");
        assert!(analysis.has_union);
        assert_eq!(analysis.ctes.len(), 1);
        assert_eq!(analysis.ctes[0].name, "a");
    }

    #[test]
    fn structural_tag_single_table() {
        let analysis = analyze_query("SELECT id FROM leads WHERE active = true");
        assert_eq!(analysis.structure, "single_table");
        assert!(!analysis.tables.is_empty());
    }

    #[test]
    fn structural_tag_multi_join() {
        let sql = "SELECT * FROM a JOIN b ON a.id = b.a_id WHERE a.x = 1";
        let analysis = analyze_query(sql);
        assert_eq!(analysis.structure, "multi_join");
        assert_eq!(analysis.joins.len(), 1);
        assert_eq!(analysis.joins[0].on_clauses, vec!["a.id = b.a_id".to_string()]);
    }

    #[test]
    fn detects_not_in_exclusion_values() {
        let analysis = analyze_query("SELECT * FROM t WHERE status NOT IN ('lost', 'spam')");
        assert_eq!(analysis.exclusions.len(), 1);
        assert_eq!(analysis.exclusions[0].kind, "not_in");
        assert_eq!(analysis.exclusions[0].values, vec!["lost", "spam"]);
    }

    #[test]
    fn detects_mtd_date_filter() {
        let analysis =
            analyze_query("SELECT * FROM t WHERE created_at >= date_trunc('month', CURRENT_DATE)");
        assert!(analysis
            .date_filters
            .iter()
            .any(|f| f.pattern == "mtd_current"));
    }

    #[test]
    fn detects_trailing_months_date_filter() {
        let analysis = analyze_query(
            "SELECT * FROM t WHERE created_at >= date_trunc('month', CURRENT_DATE) - interval '3 months'",
        );
        assert!(analysis
            .date_filters
            .iter()
            .any(|f| f.pattern == "trailing_months"));
    }

    #[test]
    fn classifies_timezone_interval_330_minutes() {
        let analysis = analyze_query("SELECT created_at + interval '330 minutes' FROM t");
        assert_eq!(analysis.timezone_conversions[0].bucket, "330_minutes");
    }

    #[test]
    fn extracts_distinct_counts() {
        let analysis = analyze_query("SELECT COUNT(DISTINCT user_id) FROM events");
        assert_eq!(analysis.distinct_counts, 1);
        assert!(analysis.aggregations[0].distinct);
    }

    #[test]
    fn extracts_positional_params_deduped_sorted() {
        let analysis = analyze_query("SELECT * FROM t WHERE a = $2 AND b = $1 AND c = $2");
        assert_eq!(analysis.positional_params, vec!["$1", "$2"]);
    }

    #[test]
    fn extracts_case_when_then_else() {
        let analysis = analyze_query(
            "SELECT CASE WHEN status = 'won' THEN 'closed' WHEN status = 'lost' THEN 'closed' ELSE 'open' END FROM t",
        );
        assert_eq!(analysis.case_blocks.len(), 1);
        assert_eq!(analysis.case_blocks[0].when_then.len(), 2);
        assert_eq!(analysis.case_blocks[0].else_branch.as_deref(), Some("'open'"));
    }
}
