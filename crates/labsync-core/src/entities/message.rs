//! Chat message entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{MessageId, RoomId, UserId};

/// A chat message as delivered by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub room_id: RoomId,
    pub sender_id: UserId,
    pub sender_name: String,
    pub content: String,
    pub sent_at: DateTime<Utc>,
}

impl ChatMessage {
    /// Whether this message was authored by the given user
    #[must_use]
    pub fn is_authored_by(&self, user_id: UserId) -> bool {
        self.sender_id == user_id
    }

    /// A short preview of the content for room lists
    #[must_use]
    pub fn preview(&self) -> String {
        const PREVIEW_LEN: usize = 80;
        if self.content.chars().count() <= PREVIEW_LEN {
            self.content.clone()
        } else {
            let cut: String = self.content.chars().take(PREVIEW_LEN).collect();
            format!("{cut}…")
        }
    }
}
