//! The ACL engine (SPEC_FULL.md §4.C).
//!
//! `resolveEmail` picks the caller's identity out of three possible
//! sources; `resolveACLs` looks up (and TTL-caches) the caller's staff
//! record; `checkToolAccess` runs the seven-step policy; `filterTools`
//! reuses the same policy to answer `list_tools` so a client never sees a
//! tool it cannot call (§8's `filterTools ⇔ checkToolAccess` bijection).

use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;

use sa_db::RelationalPool;
use sa_domain::config::{AclDocument, AclFileConfig, DefaultPolicy};
use sa_domain::error::{Error, Result};
use sa_domain::model::ToolDescriptor;

/// Outcome of `resolveACLs` cached per email: either a found-and-active
/// staff record, or a definitive "not found"/"inactive" negative result.
#[derive(Debug, Clone)]
enum CachedLookup {
    Found { acls: Vec<String>, active: bool },
    NotFound,
}

/// The result of `checkToolAccess` (§4.C).
#[derive(Debug, Clone)]
pub struct AccessDecision {
    pub allowed: bool,
    pub reason: String,
    pub acls: Option<Vec<String>>,
}

impl AccessDecision {
    fn allow(reason: impl Into<String>, acls: Option<Vec<String>>) -> Self {
        Self {
            allowed: true,
            reason: reason.into(),
            acls,
        }
    }
    fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
            acls: None,
        }
    }
}

pub struct AclEngine {
    doc: AclDocument,
    pool: Arc<RelationalPool>,
    positive_cache: Cache<String, CachedLookup>,
    negative_cache: Cache<String, ()>,
}

impl AclEngine {
    /// Load the YAML policy document from disk and build the caches per
    /// `cfg`'s TTLs.
    pub fn load(cfg: &AclFileConfig, pool: Arc<RelationalPool>) -> Result<Self> {
        let raw = std::fs::read_to_string(&cfg.path)
            .map_err(|e| Error::Config(format!("reading acl config {}: {e}", cfg.path)))?;
        let doc: AclDocument = serde_yaml::from_str(&raw)
            .map_err(|e| Error::Config(format!("parsing acl config {}: {e}", cfg.path)))?;
        Ok(Self {
            doc,
            pool,
            positive_cache: Cache::builder()
                .time_to_live(Duration::from_secs(cfg.positive_ttl_secs.max(1)))
                .build(),
            negative_cache: Cache::builder()
                .time_to_live(Duration::from_secs(cfg.negative_ttl_secs.max(1)))
                .build(),
        })
    }

    /// Explicit invalidation primitive (§5 "ACL cache").
    pub fn invalidate(&self, email: &str) {
        let key = email.to_lowercase();
        self.positive_cache.invalidate(&key);
        self.negative_cache.invalidate(&key);
    }

    /// §4.C `resolveEmail`: meta override, then session-attached email,
    /// then the process-wide environment fallback.
    pub fn resolve_email(
        meta_user_email: Option<&str>,
        session_email: Option<&str>,
        env_fallback: Option<&str>,
    ) -> Option<String> {
        for candidate in [meta_user_email, session_email, env_fallback] {
            if let Some(email) = candidate {
                if !email.trim().is_empty() {
                    return Some(email.trim().to_lowercase());
                }
            }
        }
        None
    }

    /// §4.C `resolveACLs`: normalize, check caches, fall back to the
    /// relational store; cache only positive results for the long TTL, and
    /// negative results for the short TTL (Open Question iii).
    pub async fn resolve_acls(&self, email: &str) -> Result<Option<(Vec<String>, bool)>> {
        let key = email.trim().to_lowercase();

        if let Some(hit) = self.positive_cache.get(&key) {
            sa_domain::trace::TraceEvent::AclCacheRefresh {
                email: key.clone(),
                hit: true,
            }
            .emit();
            return Ok(match hit {
                CachedLookup::Found { acls, active } => Some((acls, active)),
                CachedLookup::NotFound => None,
            });
        }
        if self.negative_cache.get(&key).is_some() {
            sa_domain::trace::TraceEvent::AclCacheRefresh {
                email: key.clone(),
                hit: true,
            }
            .emit();
            return Ok(None);
        }

        sa_domain::trace::TraceEvent::AclCacheRefresh {
            email: key.clone(),
            hit: false,
        }
        .emit();

        match self.pool.find_staff_by_email(&key).await? {
            Some(staff) => {
                self.positive_cache.insert(
                    key.clone(),
                    CachedLookup::Found {
                        acls: staff.acls.clone(),
                        active: staff.active,
                    },
                );
                Ok(Some((staff.acls, staff.active)))
            }
            None => {
                self.negative_cache.insert(key, ());
                Ok(None)
            }
        }
    }

    /// §4.C `checkToolAccess`, the seven-step algorithm.
    pub async fn check_tool_access(
        &self,
        tool_name: &str,
        email: Option<&str>,
    ) -> Result<AccessDecision> {
        let decision = self.check_tool_access_inner(tool_name, email).await?;
        sa_domain::trace::TraceEvent::AclDecision {
            tool_name: tool_name.to_string(),
            email: email.map(|e| e.to_string()),
            allowed: decision.allowed,
            reason: decision.reason.clone(),
        }
        .emit();
        Ok(decision)
    }

    async fn check_tool_access_inner(
        &self,
        tool_name: &str,
        email: Option<&str>,
    ) -> Result<AccessDecision> {
        // 1. public tool.
        if self.doc.public_tools.iter().any(|t| t == tool_name) {
            return Ok(AccessDecision::allow("public tool", None));
        }

        // 2. no email.
        let Some(email) = email else {
            return Ok(AccessDecision::deny("authentication required"));
        };

        // 3/4. staff lookup.
        let Some((acls, active)) = self.resolve_acls(email).await? else {
            return Ok(AccessDecision::deny("user not found"));
        };
        if !active {
            return Ok(AccessDecision::deny("user is inactive"));
        }

        // 5. superuser.
        if acls.iter().any(|a| self.doc.superuser_acls.contains(a)) {
            return Ok(AccessDecision::allow("superuser acl", Some(acls)));
        }

        // 6. explicit tool_acls mapping.
        if let Some(required) = self.doc.tool_acls.get(tool_name) {
            let held: std::collections::HashSet<&String> = acls.iter().collect();
            if required.iter().any(|r| held.contains(r)) {
                return Ok(AccessDecision::allow("acl match", Some(acls)));
            }
            return Ok(AccessDecision::deny(format!(
                "requires one of {:?}, user holds {:?}",
                required, acls
            )));
        }

        // 7. unlisted tool falls back to default policy.
        match self.doc.default_policy {
            DefaultPolicy::Open => Ok(AccessDecision::allow("default policy: open", Some(acls))),
            DefaultPolicy::Deny => Ok(AccessDecision::deny("default policy: deny")),
        }
    }

    /// §4.C `filterTools`: the set of descriptors the given email may call.
    pub async fn filter_tools(
        &self,
        tools: &[ToolDescriptor],
        email: Option<&str>,
    ) -> Result<Vec<ToolDescriptor>> {
        let mut visible = Vec::with_capacity(tools.len());
        for tool in tools {
            if self
                .check_tool_access(&tool.name, email)
                .await?
                .allowed
            {
                visible.push(tool.clone());
            }
        }
        Ok(visible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_email_prefers_meta_override() {
        let email = AclEngine::resolve_email(Some("a@x.com"), Some("b@x.com"), Some("c@x.com"));
        assert_eq!(email.as_deref(), Some("a@x.com"));
    }

    #[test]
    fn resolve_email_falls_back_through_chain() {
        assert_eq!(
            AclEngine::resolve_email(None, Some(" B@X.com "), Some("c@x.com")).as_deref(),
            Some("b@x.com")
        );
        assert_eq!(
            AclEngine::resolve_email(None, None, Some("c@x.com")).as_deref(),
            Some("c@x.com")
        );
        assert_eq!(AclEngine::resolve_email(None, None, None), None);
    }

    #[test]
    fn resolve_email_ignores_blank_candidates() {
        assert_eq!(
            AclEngine::resolve_email(Some(""), Some("  "), Some("c@x.com")).as_deref(),
            Some("c@x.com")
        );
    }
}
