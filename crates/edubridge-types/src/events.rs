use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Message;

/// Row changes pushed to subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum RealtimeEvent {
    /// A new row in `messages`.
    MessageInsert(Message),
}

impl RealtimeEvent {
    /// The user this change is addressed to. Subscriptions filter on it.
    pub fn recipient_id(&self) -> Uuid {
        match self {
            Self::MessageInsert(message) => message.recipient_id,
        }
    }
}
