//! Conversation session CRUD (§4.B "sessions"/"messages", §4.I routes),
//! built directly on [`sa_docstore::DocStore`]. Keeps the teacher's
//! `get`/`list`/`touch`/`resolve_or_create` naming, backed by the real
//! document store instead of a JSON-file `HashMap`.

use std::sync::Arc;

use sa_docstore::DocStore;
use sa_domain::error::{Error, Result};
use sa_domain::model::ConversationSession;

pub struct SessionStore {
    docstore: Arc<DocStore>,
}

impl SessionStore {
    pub fn new(docstore: Arc<DocStore>) -> Self {
        Self { docstore }
    }

    /// Create a new conversation session owned by `user_id`.
    pub async fn create(&self, user_id: &str, title: Option<String>) -> Result<ConversationSession> {
        let now = chrono::Utc::now();
        let session = ConversationSession {
            session_id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            title,
            created_at: now,
            updated_at: now,
        };
        self.docstore.create_session(&session).await?;
        Ok(session)
    }

    /// Fetch a session by id, scoped to its owner — `None` both when the
    /// session doesn't exist and when it exists but isn't owned by
    /// `user_id` (§4.I "404 if not owned").
    pub async fn get_owned(
        &self,
        session_id: &str,
        user_id: &str,
    ) -> Result<Option<ConversationSession>> {
        let session = self.docstore.get_session(session_id).await?;
        Ok(session.filter(|s| s.user_id == user_id))
    }

    /// List sessions owned by `user_id`, most recently updated first
    /// (§4.I `GET /sessions`).
    pub async fn list_owned(&self, user_id: &str) -> Result<Vec<ConversationSession>> {
        self.docstore.list_sessions(user_id).await
    }

    /// Delete a session (and cascade its messages) if owned by `user_id`.
    /// Returns `true` if a session was actually deleted.
    pub async fn delete_owned(&self, session_id: &str, user_id: &str) -> Result<bool> {
        if self.get_owned(session_id, user_id).await?.is_none() {
            return Ok(false);
        }
        self.docstore.delete_session(session_id).await?;
        Ok(true)
    }

    pub async fn set_title(&self, session_id: &str, title: &str) -> Result<()> {
        self.docstore.set_session_title(session_id, title).await
    }

    /// Fetch a session by id regardless of ownership, or a `NotFound`
    /// error — for internal callers (e.g. the orchestrator) that have
    /// already authorized the caller upstream.
    pub async fn require(&self, session_id: &str) -> Result<ConversationSession> {
        self.docstore
            .get_session(session_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("session {session_id}")))
    }
}
