//! Chat events emitted after a conversation changes

use serde::Serialize;

use crate::domain::conversation::ChatMessage;

#[cfg(test)]
use mockall::automock;

/// Events published to listeners of a session
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ChatEvent {
    /// A message was appended to the session log
    MessageAdded {
        session_id: String,
        message: ChatMessage,
    },
}

impl ChatEvent {
    pub fn session_id(&self) -> &str {
        match self {
            Self::MessageAdded { session_id, .. } => session_id,
        }
    }
}

/// Fan-out of chat events to interested parties
#[cfg_attr(test, automock)]
pub trait ChatEventPublisher: Send + Sync {
    /// Publishes an event, returning the number of receivers reached
    fn publish(&self, event: ChatEvent) -> usize;
}
