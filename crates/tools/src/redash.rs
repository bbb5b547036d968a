//! BI query store access (§4.D.9-10): `fetch_redash_query` and
//! `generate_rules_from_redash`.

use sa_domain::config::BiConfig;
use sa_domain::error::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::generator::{self, GeneratedRules};

/// `parseQueryIds` (§8): supports commas, whitespace, or a mix; any
/// non-numeric token fails naming that token. Idempotent per §8's law —
/// re-parsing `join(",", parseQueryIds(s))` always reproduces the same
/// ID list.
pub fn parse_query_ids(input: &str) -> Result<Vec<u64>> {
    input
        .split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|tok| {
            tok.parse::<u64>()
                .map_err(|_| Error::ValidationError(format!("invalid query id: '{tok}'")))
        })
        .collect()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RedashQuery {
    pub id: u64,
    pub name: String,
    pub description: Option<String>,
    pub query: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status")]
pub enum RedashFetchOutcome {
    #[serde(rename = "ok")]
    Ok { query: RedashQuery },
    #[serde(rename = "error")]
    Error { id: u64, message: String },
}

/// `fetch_redash_query(query_ids)` (§4.D.9) — fetches each parsed ID
/// sequentially from the BI HTTP API; a per-ID failure never aborts the
/// remaining fetches.
pub async fn fetch_redash_query(
    client: &reqwest::Client,
    cfg: &BiConfig,
    query_ids: &str,
) -> Result<Vec<RedashFetchOutcome>> {
    let ids = parse_query_ids(query_ids)?;
    let api_key = std::env::var(&cfg.api_key_env).unwrap_or_default();

    let mut outcomes = Vec::with_capacity(ids.len());
    for id in ids {
        outcomes.push(fetch_one(client, cfg, &api_key, id).await);
    }
    Ok(outcomes)
}

async fn fetch_one(client: &reqwest::Client, cfg: &BiConfig, api_key: &str, id: u64) -> RedashFetchOutcome {
    let url = format!("{}/api/queries/{id}", cfg.base_url.trim_end_matches('/'));
    let result = client
        .get(&url)
        .header("Authorization", format!("Key {api_key}"))
        .timeout(std::time::Duration::from_millis(cfg.timeout_ms))
        .send()
        .await;

    match result {
        Ok(resp) if resp.status().is_success() => match resp.json::<RedashQuery>().await {
            Ok(query) => RedashFetchOutcome::Ok { query },
            Err(e) => RedashFetchOutcome::Error {
                id,
                message: format!("malformed response: {e}"),
            },
        },
        Ok(resp) => RedashFetchOutcome::Error {
            id,
            message: format!("BI API returned {}", resp.status()),
        },
        Err(e) => RedashFetchOutcome::Error {
            id,
            message: format!("request failed: {e}"),
        },
    }
}

/// `generate_rules_from_redash(query_ids, category?, intent_keywords?)`
/// (§4.D.10) — composes [`fetch_redash_query`] with
/// [`generator::generate_rules`], one result per successfully fetched
/// query.
pub async fn generate_rules_from_redash(
    client: &reqwest::Client,
    cfg: &BiConfig,
    query_ids: &str,
    category: Option<String>,
    intent_keywords: Option<Vec<String>>,
) -> Result<Vec<RedashFetchResult>> {
    let outcomes = fetch_redash_query(client, cfg, query_ids).await?;
    let category = category.unwrap_or_else(|| "uncategorized".to_string());

    let mut results = Vec::with_capacity(outcomes.len());
    for outcome in outcomes {
        match outcome {
            RedashFetchOutcome::Ok { query } => {
                let rules = generator::generate_rules(
                    &query.query,
                    &query.name,
                    query.description.as_deref().unwrap_or(""),
                    &category,
                    intent_keywords.clone(),
                );
                results.push(match rules {
                    Ok(generated) => RedashFetchResult::Ok {
                        id: query.id,
                        generated,
                    },
                    Err(e) => RedashFetchResult::Error {
                        id: query.id,
                        message: e.to_string(),
                    },
                });
            }
            RedashFetchOutcome::Error { id, message } => {
                results.push(RedashFetchResult::Error { id, message });
            }
        }
    }
    Ok(results)
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status")]
pub enum RedashFetchResult {
    #[serde(rename = "ok")]
    Ok { id: u64, generated: GeneratedRules },
    #[serde(rename = "error")]
    Error { id: u64, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_query_ids_handles_commas_and_whitespace() {
        assert_eq!(parse_query_ids("42, 99  103").unwrap(), vec![42, 99, 103]);
    }

    #[test]
    fn parse_query_ids_reports_offending_token() {
        let err = parse_query_ids("42,x").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains('x'));
    }

    #[test]
    fn parse_query_ids_is_idempotent() {
        let input = "5, 6,7   8";
        let first = parse_query_ids(input).unwrap();
        let rejoined = first.iter().map(|n| n.to_string()).collect::<Vec<_>>().join(",");
        let second = parse_query_ids(&rejoined).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn parse_query_ids_empty_string_yields_empty_list() {
        assert_eq!(parse_query_ids("").unwrap(), Vec::<u64>::new());
    }
}
