//! The document-store adapter (SPEC_FULL.md §4.B).
//!
//! Three collections — `sessions`, `messages`, `auth_sessions` — persist
//! conversational state and auth tokens. [`DocStore::connect`] creates the
//! mandated indexes idempotently before returning, so every caller can
//! assume they exist for the lifetime of the process.

use chrono::Utc;
use futures_util::TryStreamExt;
use mongodb::bson::{doc, Document};
use mongodb::options::{FindOptions, IndexOptions};
use mongodb::{Client, Collection, Database, IndexModel};

use sa_domain::config::DocStoreConfig;
use sa_domain::error::{Error, Result};
use sa_domain::model::{AuthSession, ConversationSession, StoredMessage};
use sa_domain::trace::TraceEvent;

fn backend_err(context: &str, e: impl std::fmt::Display) -> Error {
    Error::BackendFailure(format!("{context}: {e}"))
}

/// Handle to the three mandated collections.
pub struct DocStore {
    db: Database,
    sessions: Collection<ConversationSession>,
    messages: Collection<StoredMessage>,
    auth_sessions: Collection<AuthSession>,
}

impl DocStore {
    /// Connect and create indexes (§4.B "Required indexes at startup").
    pub async fn connect(cfg: &DocStoreConfig) -> Result<Self> {
        let client = Client::with_uri_str(&cfg.uri)
            .await
            .map_err(|e| backend_err("docstore connect", e))?;
        let db = client.database(&cfg.database);

        let store = Self {
            sessions: db.collection("sessions"),
            messages: db.collection("messages"),
            auth_sessions: db.collection("auth_sessions"),
            db,
        };
        store.ensure_indexes().await?;
        tracing::info!(database = %cfg.database, "document store ready");
        Ok(store)
    }

    async fn ensure_indexes(&self) -> Result<()> {
        let unique = IndexOptions::builder().unique(true).build();

        self.sessions
            .create_index(
                IndexModel::builder()
                    .keys(doc! {"session_id": 1})
                    .options(unique.clone())
                    .build(),
            )
            .await
            .map_err(|e| backend_err("sessions.session_id index", e))?;
        self.sessions
            .create_index(
                IndexModel::builder()
                    .keys(doc! {"user_id": 1, "updated_at": -1})
                    .build(),
            )
            .await
            .map_err(|e| backend_err("sessions.(user_id,updated_at) index", e))?;

        self.messages
            .create_index(
                IndexModel::builder()
                    .keys(doc! {"session_id": 1, "created_at": 1})
                    .build(),
            )
            .await
            .map_err(|e| backend_err("messages.(session_id,created_at) index", e))?;

        self.auth_sessions
            .create_index(
                IndexModel::builder()
                    .keys(doc! {"token": 1})
                    .options(unique.clone())
                    .build(),
            )
            .await
            .map_err(|e| backend_err("auth_sessions.token index", e))?;
        self.auth_sessions
            .create_index(
                IndexModel::builder()
                    .keys(doc! {"email": 1})
                    .options(unique)
                    .build(),
            )
            .await
            .map_err(|e| backend_err("auth_sessions.email index", e))?;

        Ok(())
    }

    /// Raw handle, for callers (e.g. the SQL analyzer's reference-data
    /// loader) that need a collection this adapter doesn't expose directly.
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Close the underlying client's connection pool (SPEC_FULL.md §5
    /// "Graceful shutdown").
    pub async fn close(&self) {
        self.db.client().clone().shutdown().await;
    }

    // ── sessions ─────────────────────────────────────────────────────

    pub async fn create_session(&self, session: &ConversationSession) -> Result<()> {
        self.sessions
            .insert_one(session)
            .await
            .map_err(|e| backend_err("create session", e))?;
        TraceEvent::SessionResolved {
            session_id: session.session_id.clone(),
            user_id: session.user_id.clone(),
            is_new: true,
        }
        .emit();
        Ok(())
    }

    pub async fn get_session(&self, session_id: &str) -> Result<Option<ConversationSession>> {
        self.sessions
            .find_one(doc! {"session_id": session_id})
            .await
            .map_err(|e| backend_err("get session", e))
    }

    pub async fn list_sessions(&self, user_id: &str) -> Result<Vec<ConversationSession>> {
        let opts = FindOptions::builder().sort(doc! {"updated_at": -1}).build();
        let cursor = self
            .sessions
            .find(doc! {"user_id": user_id})
            .with_options(opts)
            .await
            .map_err(|e| backend_err("list sessions", e))?;
        cursor
            .try_collect()
            .await
            .map_err(|e| backend_err("list sessions collect", e))
    }

    /// Delete a session and cascade-delete its messages.
    pub async fn delete_session(&self, session_id: &str) -> Result<()> {
        self.messages
            .delete_many(doc! {"session_id": session_id})
            .await
            .map_err(|e| backend_err("delete session messages", e))?;
        self.sessions
            .delete_one(doc! {"session_id": session_id})
            .await
            .map_err(|e| backend_err("delete session", e))?;
        TraceEvent::SessionDeleted {
            session_id: session_id.to_string(),
        }
        .emit();
        Ok(())
    }

    pub async fn touch_session(&self, session_id: &str) -> Result<()> {
        self.sessions
            .update_one(
                doc! {"session_id": session_id},
                doc! {"$set": {"updated_at": mongodb::bson::DateTime::from_chrono(Utc::now())}},
            )
            .await
            .map_err(|e| backend_err("touch session", e))?;
        Ok(())
    }

    pub async fn set_session_title(&self, session_id: &str, title: &str) -> Result<()> {
        self.sessions
            .update_one(
                doc! {"session_id": session_id},
                doc! {"$set": {
                    "title": title,
                    "updated_at": mongodb::bson::DateTime::from_chrono(Utc::now()),
                }},
            )
            .await
            .map_err(|e| backend_err("set session title", e))?;
        Ok(())
    }

    // ── messages ─────────────────────────────────────────────────────

    /// Append a message and touch the parent session's `updated_at` in the
    /// same logical step (§4.B "append message").
    pub async fn append_message(&self, message: &StoredMessage) -> Result<()> {
        self.messages
            .insert_one(message)
            .await
            .map_err(|e| backend_err("append message", e))?;
        self.touch_session(&message.session_id).await?;
        TraceEvent::MessageAppended {
            session_id: message.session_id.clone(),
            role: format!("{:?}", message.role),
        }
        .emit();
        Ok(())
    }

    /// Ordered transcript for a session, strictly by `created_at`
    /// (ties broken by insertion order via the compound index).
    pub async fn list_messages(&self, session_id: &str) -> Result<Vec<StoredMessage>> {
        let opts = FindOptions::builder().sort(doc! {"created_at": 1}).build();
        let cursor = self
            .messages
            .find(doc! {"session_id": session_id})
            .with_options(opts)
            .await
            .map_err(|e| backend_err("list messages", e))?;
        cursor
            .try_collect()
            .await
            .map_err(|e| backend_err("list messages collect", e))
    }

    // ── auth sessions ────────────────────────────────────────────────

    pub async fn get_auth_session_by_email(&self, email: &str) -> Result<Option<AuthSession>> {
        self.auth_sessions
            .find_one(doc! {"email": email})
            .await
            .map_err(|e| backend_err("get auth session by email", e))
    }

    pub async fn get_auth_session_by_token(&self, token: &str) -> Result<Option<AuthSession>> {
        self.auth_sessions
            .find_one(doc! {"token": token})
            .await
            .map_err(|e| backend_err("get auth session by token", e))
    }

    pub async fn create_auth_session(&self, session: &AuthSession) -> Result<()> {
        self.auth_sessions
            .insert_one(session)
            .await
            .map_err(|e| backend_err("create auth session", e))?;
        Ok(())
    }

    /// Refresh profile fields (name/picture) for an existing session while
    /// preserving its token (§4.G "Login", step 3).
    pub async fn refresh_auth_session_profile(
        &self,
        email: &str,
        name: Option<&str>,
        picture: Option<&str>,
    ) -> Result<()> {
        let mut set: Document = doc! {};
        if let Some(n) = name {
            set.insert("name", n);
        }
        if let Some(p) = picture {
            set.insert("picture", p);
        }
        if set.is_empty() {
            return Ok(());
        }
        self.auth_sessions
            .update_one(doc! {"email": email}, doc! {"$set": set})
            .await
            .map_err(|e| backend_err("refresh auth session", e))?;
        Ok(())
    }

    pub async fn delete_auth_session_by_token(&self, token: &str) -> Result<()> {
        self.auth_sessions
            .delete_one(doc! {"token": token})
            .await
            .map_err(|e| backend_err("delete auth session", e))?;
        Ok(())
    }
}
