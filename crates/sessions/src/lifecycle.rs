//! Login / validate / logout (§4.G).
//!
//! `LifecycleManager` is the seam between the identity provider's decoded
//! profile (`crate::identity`), the staff allow-list (`sa_db`), and the
//! `auth_sessions` collection (`sa_docstore`): it is the only place those
//! three are stitched together.

use std::sync::Arc;

use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use sa_db::RelationalPool;
use sa_docstore::DocStore;
use sa_domain::error::{Error, Result};
use sa_domain::model::{AuthSession, User};
use sa_domain::trace::TraceEvent;

use crate::identity::IdentityProfile;

/// Generate a 32-byte, OS-RNG-backed opaque token, hex-encoded (§3 "Auth
/// session", §9 "Representation decisions").
fn new_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Constant-time comparison of two tokens by their SHA-256 digests,
/// following the teacher's `require_api_token` pattern (§4.G "added").
fn tokens_match(provided: &str, expected: &str) -> bool {
    let a = Sha256::digest(provided.as_bytes());
    let b = Sha256::digest(expected.as_bytes());
    bool::from(a.ct_eq(&b))
}

pub struct LifecycleManager {
    pool: Arc<RelationalPool>,
    docstore: Arc<DocStore>,
}

impl LifecycleManager {
    pub fn new(pool: Arc<RelationalPool>, docstore: Arc<DocStore>) -> Self {
        Self { pool, docstore }
    }

    /// §4.G "Login": decode happens in the caller (HTTP handler); this
    /// takes the already-decoded profile, checks the staff allow-list, and
    /// either refreshes an existing auth session or mints a new one.
    pub async fn login(&self, profile: IdentityProfile) -> Result<(AuthSession, bool)> {
        let staff = self
            .pool
            .find_staff_by_email(&profile.email)
            .await?
            .ok_or_else(|| Error::AccessDenied("user not found".into()))?;
        if !staff.active {
            return Err(Error::AccessDenied("user is inactive".into()));
        }

        if let Some(existing) = self.docstore.get_auth_session_by_email(&profile.email).await? {
            self.docstore
                .refresh_auth_session_profile(
                    &profile.email,
                    profile.name.as_deref(),
                    profile.picture.as_deref(),
                )
                .await?;
            TraceEvent::AuthLogin {
                email: profile.email.clone(),
                is_new_session: false,
            }
            .emit();
            let refreshed = AuthSession {
                name: profile.name.or(existing.name.clone()),
                picture: profile.picture.or(existing.picture.clone()),
                ..existing
            };
            return Ok((refreshed, false));
        }

        let session = AuthSession {
            token: new_token(),
            user_id: profile.email.clone(),
            email: profile.email.clone(),
            name: profile.name,
            picture: profile.picture,
            created_at: chrono::Utc::now(),
        };
        self.docstore.create_auth_session(&session).await?;
        TraceEvent::AuthLogin {
            email: session.email.clone(),
            is_new_session: true,
        }
        .emit();
        Ok((session, true))
    }

    /// §4.G "Validate": O(1) by token index; constant-time comparison
    /// guards against timing side channels even though the index lookup
    /// itself is exact-match.
    pub async fn validate(&self, token: &str) -> Result<Option<User>> {
        let Some(session) = self.docstore.get_auth_session_by_token(token).await? else {
            return Ok(None);
        };
        if !tokens_match(token, &session.token) {
            return Ok(None);
        }
        Ok(Some(User {
            email: session.email,
            name: session.name,
            picture: session.picture,
        }))
    }

    /// §4.G "Logout": delete by token; the client is unauthenticated
    /// regardless of whether the delete found a row.
    pub async fn logout(&self, token: &str) -> Result<()> {
        self.docstore.delete_auth_session_by_token(token).await?;
        TraceEvent::AuthLogout {
            token_prefix: token.chars().take(8).collect(),
        }
        .emit();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_match_identical() {
        assert!(tokens_match("abc", "abc"));
    }

    #[test]
    fn tokens_match_rejects_mismatch() {
        assert!(!tokens_match("abc", "abd"));
    }

    #[test]
    fn new_token_is_64_hex_chars() {
        let t = new_token();
        assert_eq!(t.len(), 64);
        assert!(t.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn new_token_is_not_constant() {
        assert_ne!(new_token(), new_token());
    }
}
