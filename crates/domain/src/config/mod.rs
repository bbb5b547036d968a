mod acl;
mod agent;
mod bi;
mod db;
mod docstore;
mod llm;
mod mcp;
mod observability;
mod server;

pub use acl::*;
pub use agent::*;
pub use bi::*;
pub use db::*;
pub use docstore::*;
pub use llm::*;
pub use mcp::*;
pub use observability::*;
pub use server::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub docstore: DocStoreConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub bi: BiConfig,
    #[serde(default)]
    pub mcp: McpConfig,
    #[serde(default)]
    pub acl: AclFileConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

fn is_http_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

impl Config {
    /// Validate the configuration and return a list of issues. Aggregates
    /// every problem rather than failing on the first one, matching the
    /// teacher's `Config::validate()` style.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.port".into(),
                message: "port must be greater than 0".into(),
            });
        }
        if self.server.host.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.host".into(),
                message: "host must not be empty".into(),
            });
        }

        if self.db.url.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "db.url".into(),
                message: "database url must not be empty (set SA_DATABASE_URL)".into(),
            });
        }
        if self.db.max_connections == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "db.max_connections".into(),
                message: "max_connections must be greater than 0".into(),
            });
        }

        if self.docstore.uri.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "docstore.uri".into(),
                message: "document store uri must not be empty (set SA_DOCSTORE_URI)".into(),
            });
        }

        if self.llm.base_url.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "llm.base_url".into(),
                message: "no LLM endpoint configured; chat endpoints will fail until set".into(),
            });
        } else if !is_http_url(&self.llm.base_url) {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "llm.base_url".into(),
                message: format!(
                    "base_url must start with http:// or https:// (got \"{}\")",
                    self.llm.base_url
                ),
            });
        }

        if !self.bi.base_url.is_empty() && !is_http_url(&self.bi.base_url) {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "bi.base_url".into(),
                message: format!(
                    "base_url must start with http:// or https:// (got \"{}\")",
                    self.bi.base_url
                ),
            });
        }

        if self.acl.path.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "acl.path".into(),
                message: "acl config path must not be empty".into(),
            });
        }
        if self.acl.positive_ttl_secs == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "acl.positive_ttl_secs".into(),
                message: "a zero TTL disables ACL caching entirely".into(),
            });
        }

        if self.agent.max_loops == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "agent.max_loops".into(),
                message: "max_loops must be greater than 0 to ever produce a final answer".into(),
            });
        }

        if let Some(url) = &self.mcp.peer_sse_url {
            if !is_http_url(url) {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: "mcp.peer_sse_url".into(),
                    message: format!("peer_sse_url must start with http:// or https:// (got \"{url}\")"),
                });
            }
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            db: DbConfig {
                url: "postgres://localhost/db".into(),
                ..Default::default()
            },
            docstore: DocStoreConfig {
                uri: "mongodb://localhost/db".into(),
                ..Default::default()
            },
            llm: LlmConfig {
                base_url: "https://api.openai.com".into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn find_issue<'a>(errors: &'a [ConfigError], field: &str) -> Option<&'a ConfigError> {
        errors.iter().find(|e| e.field == field)
    }

    #[test]
    fn valid_config_has_no_errors() {
        let errors = valid_config().validate();
        let hard: Vec<_> = errors
            .iter()
            .filter(|e| e.severity == ConfigSeverity::Error)
            .collect();
        assert!(hard.is_empty(), "unexpected errors: {hard:?}");
    }

    #[test]
    fn empty_db_url_is_error() {
        let mut cfg = valid_config();
        cfg.db.url = String::new();
        let errors = cfg.validate();
        assert!(find_issue(&errors, "db.url").is_some());
    }

    #[test]
    fn empty_docstore_uri_is_error() {
        let mut cfg = valid_config();
        cfg.docstore.uri = String::new();
        let errors = cfg.validate();
        assert!(find_issue(&errors, "docstore.uri").is_some());
    }

    #[test]
    fn bad_llm_scheme_is_error() {
        let mut cfg = valid_config();
        cfg.llm.base_url = "ftp://nope".into();
        let errors = cfg.validate();
        assert!(find_issue(&errors, "llm.base_url").is_some());
    }

    #[test]
    fn zero_max_loops_is_error() {
        let mut cfg = valid_config();
        cfg.agent.max_loops = 0;
        let errors = cfg.validate();
        assert!(find_issue(&errors, "agent.max_loops").is_some());
    }

    #[test]
    fn zero_port_is_error() {
        let mut cfg = valid_config();
        cfg.server.port = 0;
        let errors = cfg.validate();
        assert!(find_issue(&errors, "server.port").is_some());
    }
}
