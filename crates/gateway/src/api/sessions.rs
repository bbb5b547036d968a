//! `/sessions*` handlers (SPEC_FULL.md §4.I): conversation session CRUD
//! plus the message-send endpoint that drives the agent orchestrator.
//!
//! Grounded on the teacher's `api/sessions.rs` (list/get/reset handler
//! shape — scoped to the caller's own sessions, 404 on a foreign id) and
//! `api/chat.rs` (the turn-invocation / response-assembly shape for the
//! message-send route), adapted to this spec's non-streaming, single
//! `{assistantText, toolCalls[]}` response contract.

use axum::extract::{Extension, Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use sa_domain::error::Error;
use sa_domain::model::{ConversationSession, StoredMessage};

use crate::api::auth::AuthenticatedUser;
use crate::api::error::{ApiError, ApiResult};
use crate::orchestrator;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SessionSummary {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    pub title: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: chrono::DateTime<chrono::Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<ConversationSession> for SessionSummary {
    fn from(s: ConversationSession) -> Self {
        Self {
            session_id: s.session_id,
            title: s.title,
            created_at: s.created_at,
            updated_at: s.updated_at,
        }
    }
}

/// `GET /sessions` — list sessions owned by the caller, `updatedAt` desc.
pub async fn list_sessions(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
) -> ApiResult<impl IntoResponse> {
    let sessions = state
        .session_store
        .list_owned(&auth.user.email)
        .await
        .map_err(ApiError::from)?;
    let summaries: Vec<SessionSummary> = sessions.into_iter().map(Into::into).collect();
    Ok(Json(summaries))
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub title: Option<String>,
}

/// `POST /sessions` — create a new session owned by the caller.
pub async fn create_session(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Json(body): Json<CreateSessionRequest>,
) -> ApiResult<impl IntoResponse> {
    let session = state
        .session_store
        .create(&auth.user.email, body.title)
        .await
        .map_err(ApiError::from)?;
    Ok(Json(SessionSummary::from(session)))
}

#[derive(Debug, Serialize)]
pub struct SessionDetail {
    #[serde(flatten)]
    pub session: SessionSummary,
    pub messages: Vec<MessageView>,
}

#[derive(Debug, Serialize)]
pub struct MessageView {
    pub role: sa_domain::model::MessageRole,
    pub content: String,
    #[serde(rename = "toolName", skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(rename = "toolInput", skip_serializing_if = "Option::is_none")]
    pub tool_input: Option<serde_json::Value>,
    #[serde(rename = "toolUseId", skip_serializing_if = "Option::is_none")]
    pub tool_use_id: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<StoredMessage> for MessageView {
    fn from(m: StoredMessage) -> Self {
        Self {
            role: m.role,
            content: m.content,
            tool_name: m.tool_name,
            tool_input: m.tool_input,
            tool_use_id: m.tool_use_id,
            created_at: m.created_at,
        }
    }
}

/// `GET /sessions/{id}` — session + ordered messages; 404 if not owned.
pub async fn get_session(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(session_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let session = state
        .session_store
        .get_owned(&session_id, &auth.user.email)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::from(Error::NotFound(format!("session {session_id}"))))?;
    let messages = state
        .docstore
        .list_messages(&session_id)
        .await
        .map_err(ApiError::from)?;
    Ok(Json(SessionDetail {
        session: session.into(),
        messages: messages.into_iter().map(Into::into).collect(),
    }))
}

/// `DELETE /sessions/{id}` — cascade delete; 404 if not owned.
pub async fn delete_session(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(session_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let deleted = state
        .session_store
        .delete_owned(&session_id, &auth.user.email)
        .await
        .map_err(ApiError::from)?;
    if !deleted {
        return Err(ApiError::from(Error::NotFound(format!("session {session_id}"))));
    }
    Ok(axum::http::StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    #[serde(rename = "assistantText")]
    pub assistant_text: String,
    #[serde(rename = "toolCalls")]
    pub tool_calls: Vec<orchestrator::ToolCallRecord>,
}

/// `POST /sessions/{id}/messages` — drive the agent orchestrator (§4.H)
/// for one user turn; 404 if the session isn't owned by the caller.
pub async fn send_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(session_id): Path<String>,
    Json(body): Json<SendMessageRequest>,
) -> ApiResult<impl IntoResponse> {
    state
        .session_store
        .get_owned(&session_id, &auth.user.email)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::from(Error::NotFound(format!("session {session_id}"))))?;

    let outcome = orchestrator::handle_user_message(&state, &session_id, &auth.user.email, body.message)
        .await
        .map_err(ApiError::from)?;

    Ok(Json(SendMessageResponse {
        assistant_text: outcome.assistant_text,
        tool_calls: outcome.tool_calls,
    }))
}
