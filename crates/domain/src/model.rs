//! Core data-model entities (SPEC_FULL.md §3).
//!
//! These are storage-shape structs: the document-store adapter
//! (`sa-docstore`) reads/writes them directly, and the HTTP API
//! (`sa-gateway`) serializes them to JSON responses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A resolved user identity. Derived from the identity provider's profile
/// blob plus the staff allow-list entry; never created by this system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Canonical id IS the email (lowercase, trimmed).
    pub email: String,
    pub name: Option<String>,
    pub picture: Option<String>,
}

/// A read-only staff allow-list record (external source of truth).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffRecord {
    pub email: String,
    pub active: bool,
    #[serde(default)]
    pub acls: Vec<String>,
}

/// An opaque bearer-token session issued after a successful login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub token: String,
    pub user_id: String,
    pub email: String,
    pub name: Option<String>,
    pub picture: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A conversation owned by one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSession {
    pub session_id: String,
    pub user_id: String,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The role of a message within a conversation transcript.
///
/// Distinct from `sa_domain::tool::Role` (the LLM wire-format role): this is
/// the stored transcript role, which has four variants instead of three
/// because tool_use/tool_result are tracked as first-class rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
    ToolUse,
    ToolResult,
}

/// A single transcript row (append-only; see invariants in SPEC_FULL.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    pub session_id: String,
    pub role: MessageRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_input: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_use_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl StoredMessage {
    pub fn user(session_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            role: MessageRole::User,
            content: content.into(),
            tool_name: None,
            tool_input: None,
            tool_use_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn assistant(session_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            role: MessageRole::Assistant,
            content: content.into(),
            tool_name: None,
            tool_input: None,
            tool_use_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn tool_use(
        session_id: impl Into<String>,
        tool_use_id: impl Into<String>,
        tool_name: impl Into<String>,
        tool_input: serde_json::Value,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            role: MessageRole::ToolUse,
            content: String::new(),
            tool_name: Some(tool_name.into()),
            tool_input: Some(tool_input),
            tool_use_id: Some(tool_use_id.into()),
            created_at: Utc::now(),
        }
    }

    pub fn tool_result(
        session_id: impl Into<String>,
        tool_use_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            role: MessageRole::ToolResult,
            content: content.into(),
            tool_name: None,
            tool_input: None,
            tool_use_id: Some(tool_use_id.into()),
            created_at: Utc::now(),
        }
    }
}

/// A single tool's declarative descriptor (§3 "Tool descriptor").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    /// JSON-schema object describing the tool's input.
    pub input_schema: serde_json::Value,
    /// Required ACL tags (OR semantics). Empty means "default policy or
    /// public list governs this tool" (§4.C).
    #[serde(default)]
    pub required_acls: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_use_and_tool_result_share_id() {
        let u = StoredMessage::tool_use("s1", "u1", "query", serde_json::json!({"sql": "select 1"}));
        let r = StoredMessage::tool_result("s1", "u1", "1");
        assert_eq!(u.tool_use_id, r.tool_use_id);
        assert_eq!(u.role, MessageRole::ToolUse);
        assert_eq!(r.role, MessageRole::ToolResult);
    }
}
