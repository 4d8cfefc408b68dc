//! Chat event bus backed by a tokio broadcast channel

use tokio::sync::broadcast;
use tracing::debug;

use crate::domain::events::{ChatEvent, ChatEventPublisher};

const DEFAULT_CAPACITY: usize = 256;

/// In-process fan-out of chat events
///
/// Subscribers that lag behind by more than the channel capacity miss the
/// oldest events.
#[derive(Debug, Clone)]
pub struct BroadcastEventBus {
    sender: broadcast::Sender<ChatEvent>,
}

impl BroadcastEventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatEventPublisher for BroadcastEventBus {
    fn publish(&self, event: ChatEvent) -> usize {
        let session_id = event.session_id().to_string();

        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                debug!(session_id = %session_id, "No subscribers for chat event");
                0
            }
        }
    }
}
