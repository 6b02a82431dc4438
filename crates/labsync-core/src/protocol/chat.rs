//! Chat feed protocol
//!
//! Inbound events are classified by a `type` discriminator. Frames are JSON
//! first; a handful of legacy free-text status strings are matched as a
//! fallback when JSON parsing fails.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::{ChatMessage, UserStatus};
use crate::ids::{MessageId, RoomId, UserId};

/// One user in a room presence snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomOccupant {
    pub user_id: UserId,
    pub user_name: String,
    #[serde(default)]
    pub status: UserStatus,
}

/// Inbound chat feed events, tagged by `type`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum ChatEvent {
    /// Authoritative message payload
    #[serde(rename = "chat_message")]
    ChatMessage(ChatMessage),

    /// Lightweight notification that a message was posted to a room
    #[serde(rename = "chat_message_notification")]
    ChatMessageNotification {
        room_id: RoomId,
        message_id: MessageId,
        sender_id: UserId,
        sender_name: String,
        #[serde(default)]
        preview: Option<String>,
    },

    /// Global online/offline transition for a user
    #[serde(rename = "UserOnlineStatus")]
    UserOnlineStatus {
        user_id: UserId,
        user_name: String,
        is_online: bool,
        #[serde(default)]
        last_seen: Option<DateTime<Utc>>,
    },

    /// Bulk snapshot of who is online in a room
    #[serde(rename = "ChatOnlineUsers")]
    ChatOnlineUsers {
        room_id: RoomId,
        users: Vec<RoomOccupant>,
    },

    /// Per-room status delta for a single user
    #[serde(rename = "UserStatusUpdate")]
    UserStatusUpdate {
        room_id: RoomId,
        user_id: UserId,
        user_name: String,
        status: UserStatus,
    },

    /// Remote user started or stopped typing
    #[serde(rename = "UserTyping")]
    UserTyping {
        room_id: RoomId,
        user_id: UserId,
        user_name: String,
        is_typing: bool,
    },

    /// Server-initiated keep-alive; must be acknowledged immediately
    #[serde(rename = "Heartbeat")]
    Heartbeat,
}

/// Outbound chat feed commands, tagged by `type`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum ClientCommand {
    #[serde(rename = "JoinChat")]
    JoinChat {
        room_id: RoomId,
        user_id: UserId,
        user_name: String,
    },

    #[serde(rename = "LeaveChat")]
    LeaveChat { room_id: RoomId, user_id: UserId },

    #[serde(rename = "RequestOnlineUsers")]
    RequestOnlineUsers { room_id: RoomId },

    #[serde(rename = "UpdateStatus")]
    UpdateStatus {
        room_id: RoomId,
        user_id: UserId,
        status: UserStatus,
    },

    #[serde(rename = "TypingStart")]
    TypingStart {
        room_id: RoomId,
        user_id: UserId,
        user_name: String,
    },

    #[serde(rename = "TypingStop")]
    TypingStop { room_id: RoomId, user_id: UserId },

    /// Keep-alive, sent on a fixed interval and as a reply to the server's
    #[serde(rename = "Heartbeat")]
    Heartbeat,
}

impl ClientCommand {
    /// Serialize to a JSON frame
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Classification of a raw inbound chat frame
#[derive(Debug, Clone, PartialEq)]
pub enum InboundChatFrame {
    /// A recognized structured event
    Event(ChatEvent),
    /// Legacy free-text connection confirmation
    ConnectionConfirmed(String),
    /// Structured JSON with an unknown `type` value
    Unrecognized { kind: String },
    /// Neither valid JSON nor a known legacy string
    Malformed,
}

/// Decode a raw chat feed frame.
///
/// JSON parse is attempted first; text-pattern matching is the fallback for
/// legacy status strings that carry no structure.
#[must_use]
pub fn decode_chat_frame(raw: &str) -> InboundChatFrame {
    if let Ok(event) = serde_json::from_str::<ChatEvent>(raw) {
        return InboundChatFrame::Event(event);
    }

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(raw) {
        // Valid JSON, but not a recognized event shape
        if let Some(kind) = value.get("type").and_then(serde_json::Value::as_str) {
            return InboundChatFrame::Unrecognized {
                kind: kind.to_string(),
            };
        }
        return InboundChatFrame::Malformed;
    }

    let text = raw.trim();
    if is_connection_confirmation(text) {
        return InboundChatFrame::ConnectionConfirmed(text.to_string());
    }

    InboundChatFrame::Malformed
}

/// Match the legacy connection-confirmation strings the backend still emits
fn is_connection_confirmation(text: &str) -> bool {
    text.eq_ignore_ascii_case("connected") || text.starts_with("Connected to chat")
}
