//! Identity decoding for the `POST /auth/google` login flow (§4.G, step 1).
//!
//! The identity provider hands the browser an opaque base64-encoded JSON
//! blob; this module's only job is decoding and normalizing it. Nothing
//! here talks to the staff table or the document store — that's
//! [`crate::lifecycle`].

use base64::Engine;
use serde::Deserialize;

use sa_domain::error::{Error, Result};

/// Minimum shape guaranteed by the identity provider (§6): `email` is
/// required, `name`/`picture` are best-effort.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityProfile {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

impl IdentityProfile {
    /// Decode a base64 JSON profile blob, then normalize the email
    /// (lowercase, trimmed) per §3 "User identity".
    pub fn decode(blob: &str) -> Result<Self> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(blob.trim())
            .map_err(|e| Error::ValidationError(format!("invalid base64 profile: {e}")))?;
        let mut profile: IdentityProfile = serde_json::from_slice(&bytes)
            .map_err(|e| Error::ValidationError(format!("invalid profile JSON: {e}")))?;
        profile.email = profile.email.trim().to_lowercase();
        if profile.email.is_empty() {
            return Err(Error::ValidationError("profile is missing an email".into()));
        }
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(json: &str) -> String {
        base64::engine::general_purpose::STANDARD.encode(json.as_bytes())
    }

    #[test]
    fn decodes_minimal_profile() {
        let blob = encode(r#"{"email":"  A@Example.com  "}"#);
        let profile = IdentityProfile::decode(&blob).unwrap();
        assert_eq!(profile.email, "a@example.com");
        assert!(profile.name.is_none());
    }

    #[test]
    fn decodes_full_profile() {
        let blob = encode(r#"{"email":"a@x.com","name":"A","picture":"https://x/p.png"}"#);
        let profile = IdentityProfile::decode(&blob).unwrap();
        assert_eq!(profile.name.as_deref(), Some("A"));
        assert_eq!(profile.picture.as_deref(), Some("https://x/p.png"));
    }

    #[test]
    fn rejects_bad_base64() {
        assert!(IdentityProfile::decode("not base64!!").is_err());
    }

    #[test]
    fn rejects_missing_email() {
        let blob = encode(r#"{"name":"A"}"#);
        assert!(IdentityProfile::decode(&blob).is_err());
    }

    #[test]
    fn rejects_blank_email() {
        let blob = encode(r#"{"email":"   "}"#);
        assert!(IdentityProfile::decode(&blob).is_err());
    }
}
