use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ACL config document (§6 "ACL config file")
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Points at the YAML document described in §6; loaded separately from the
/// main TOML `Config` (it is operator-edited policy, not process wiring).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AclFileConfig {
    #[serde(default = "d_acl_config_path")]
    pub path: String,
    /// Positive-cache TTL for `resolveACLs` lookups (§4.C, default 5 min).
    #[serde(default = "d_positive_ttl_secs")]
    pub positive_ttl_secs: u64,
    /// Negative-cache TTL for "user not found" lookups (Open Question iii).
    #[serde(default = "d_negative_ttl_secs")]
    pub negative_ttl_secs: u64,
}

impl Default for AclFileConfig {
    fn default() -> Self {
        Self {
            path: d_acl_config_path(),
            positive_ttl_secs: d_positive_ttl_secs(),
            negative_ttl_secs: d_negative_ttl_secs(),
        }
    }
}

fn d_acl_config_path() -> String {
    "acl.yaml".into()
}
fn d_positive_ttl_secs() -> u64 {
    300
}
fn d_negative_ttl_secs() -> u64 {
    30
}

/// The ACL policy document itself: `default_policy`, `superuser_acls`,
/// `public_tools`, `tool_acls` (§3 "ACL config").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AclDocument {
    pub default_policy: DefaultPolicy,
    #[serde(default)]
    pub superuser_acls: Vec<String>,
    #[serde(default)]
    pub public_tools: Vec<String>,
    /// tool name -> required ACL tags (OR semantics).
    #[serde(default)]
    pub tool_acls: HashMap<String, Vec<String>>,
}

/// Open Question (ii): the spec mandates lowercase-only casing. Deserializing
/// any other casing (`"Open"`, `"DENY"`, ...) is a hard validation error
/// produced by `serde`'s enum matching itself rather than a silent
/// normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefaultPolicy {
    Open,
    Deny,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_lowercase_policy() {
        let raw = "default_policy: Deny\n";
        let err = serde_yaml::from_str::<AclDocument>(raw).unwrap_err();
        assert!(err.to_string().len() > 0);
    }

    #[test]
    fn accepts_lowercase_policy() {
        let raw = "default_policy: deny\nsuperuser_acls: [ADMIN]\n";
        let doc: AclDocument = serde_yaml::from_str(raw).unwrap();
        assert_eq!(doc.default_policy, DefaultPolicy::Deny);
        assert_eq!(doc.superuser_acls, vec!["ADMIN".to_string()]);
    }
}
