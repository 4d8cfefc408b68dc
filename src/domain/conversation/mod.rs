//! Conversation domain - sessions and their message logs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::DomainError;
use crate::domain::rag::Source;

/// Key prefix of session records
pub const SESSION_KEY_PREFIX: &str = "session:";

/// Key prefix of per-session message lists
pub const CHAT_KEY_PREFIX: &str = "chat:";

/// Validates a caller-supplied session identifier
pub fn validate_session_id(id: &str) -> Result<(), DomainError> {
    if id.trim().is_empty() {
        return Err(DomainError::validation("Session ID is required"));
    }

    if id.chars().any(|c| c.is_whitespace() || c == '*' || c == '?' || c == '[') {
        return Err(DomainError::validation(format!(
            "Session ID '{}' contains invalid characters",
            id
        )));
    }

    Ok(())
}

pub fn session_key(id: &str) -> String {
    format!("{}{}", SESSION_KEY_PREFIX, id)
}

pub fn history_key(id: &str) -> String {
    format!("{}{}", CHAT_KEY_PREFIX, id)
}

/// One conversation record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub created: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            created: now,
            last_activity: now,
        }
    }

    /// Session with a freshly generated identifier
    pub fn generate() -> Self {
        Self::new(Uuid::new_v4().to_string())
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }
}

/// Author of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    #[serde(alias = "bot")]
    Assistant,
}

/// An entry of a conversation log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    #[serde(alias = "type")]
    pub role: MessageRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<Source>>,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    fn new(role: MessageRole, content: impl Into<String>, sources: Option<Vec<Source>>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            sources,
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content, None)
    }

    pub fn assistant(content: impl Into<String>, sources: Vec<Source>) -> Self {
        Self::new(MessageRole::Assistant, content, Some(sources))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_session_id() {
        assert!(validate_session_id("abc-123").is_ok());
        assert!(validate_session_id("").unwrap_err().is_validation());
        assert!(validate_session_id("   ").unwrap_err().is_validation());
        assert!(validate_session_id("a*").is_err());
        assert!(validate_session_id("a b").is_err());
    }

    #[test]
    fn test_keys() {
        assert_eq!(session_key("s1"), "session:s1");
        assert_eq!(history_key("s1"), "chat:s1");
    }

    #[test]
    fn test_session_touch() {
        let mut session = Session::new("s1");
        let created = session.created;
        session.touch();

        assert_eq!(session.created, created);
        assert!(session.last_activity >= created);
    }

    #[test]
    fn test_generated_sessions_differ() {
        assert_ne!(Session::generate().id, Session::generate().id);
    }

    #[test]
    fn test_message_serialization() {
        let message = ChatMessage::user("hello");
        let json = serde_json::to_value(&message).unwrap();

        assert_eq!(json["role"], "user");
        assert!(json.get("sources").is_none());

        let reply = ChatMessage::assistant("hi", vec![]);
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["role"], "assistant");
        assert!(json["sources"].is_array());
    }

    #[test]
    fn test_message_accepts_legacy_shape() {
        let json = r#"{"id":"1","type":"bot","content":"x","timestamp":"2026-10-01T00:00:00Z"}"#;
        let message: ChatMessage = serde_json::from_str(json).unwrap();
        assert_eq!(message.role, MessageRole::Assistant);
        assert!(message.sources.is_none());
    }
}
