//! Conversation store
//!
//! Sessions live under `session:{id}` and their messages in the list
//! `chat:{id}`. Every append pushes first, then slides the expiry of both
//! keys to the full inactivity window.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::domain::cache::{Cache, CacheExt};
use crate::domain::conversation::{
    ChatMessage, Session, history_key, session_key, validate_session_id,
};
use crate::domain::DomainError;

/// Session and message log persistence with a sliding TTL
#[derive(Debug)]
pub struct ConversationService {
    store: Arc<dyn Cache>,
    ttl: Duration,
}

impl ConversationService {
    pub fn new(store: Arc<dyn Cache>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Starts a session with a generated id
    pub async fn create_session(&self) -> Result<Session, DomainError> {
        let session = Session::generate();
        self.save_session(&session).await?;
        debug!(session_id = %session.id, "Created session");
        Ok(session)
    }

    pub async fn get_session(&self, id: &str) -> Result<Option<Session>, DomainError> {
        validate_session_id(id)?;
        self.store.get(&session_key(id)).await
    }

    /// Appends a message and slides the session expiry; returns the log length
    pub async fn append(&self, id: &str, message: &ChatMessage) -> Result<usize, DomainError> {
        validate_session_id(id)?;

        let history = history_key(id);
        let length = self.store.push(&history, message).await?;

        let session = match self.store.get::<Session>(&session_key(id)).await {
            Ok(Some(mut session)) => {
                session.touch();
                session
            }
            Ok(None) => Session::new(id),
            Err(e) => {
                warn!(session_id = %id, error = %e, "Unreadable session record, replacing it");
                Session::new(id)
            }
        };
        self.save_session(&session).await?;
        self.store.expire(&history, self.ttl).await?;

        debug!(session_id = %id, length, role = ?message.role, "Appended message");
        Ok(length)
    }

    /// Messages in append order; undecodable entries are skipped
    pub async fn history(&self, id: &str) -> Result<Vec<ChatMessage>, DomainError> {
        validate_session_id(id)?;

        let entries = self.store.list_range(&history_key(id)).await?;

        Ok(entries
            .iter()
            .filter_map(|entry| match serde_json::from_str(entry) {
                Ok(message) => Some(message),
                Err(e) => {
                    warn!(session_id = %id, error = %e, "Skipping undecodable message");
                    None
                }
            })
            .collect())
    }

    /// Drops the whole message log; the session record is kept
    pub async fn clear(&self, id: &str) -> Result<bool, DomainError> {
        validate_session_id(id)?;

        let removed = self.store.delete(&history_key(id)).await?;
        debug!(session_id = %id, removed, "Cleared history");
        Ok(removed)
    }

    async fn save_session(&self, session: &Session) -> Result<(), DomainError> {
        self.store
            .set(&session_key(&session.id), session, self.ttl)
            .await
    }
}
