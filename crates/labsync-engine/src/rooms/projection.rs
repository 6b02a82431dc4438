//! Room projection
//!
//! Mutated only by the dispatcher in response to message events; the
//! presentation layer reads snapshots.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use labsync_core::{ChatMessage, MessageId, RoomId, UserId};

/// Per-room list entry: last message preview and unread count
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSummary {
    pub room_id: RoomId,
    pub preview: Option<String>,
    pub unread: u32,
    pub last_activity: Option<DateTime<Utc>>,
}

impl RoomSummary {
    fn new(room_id: RoomId) -> Self {
        Self {
            room_id,
            preview: None,
            unread: 0,
            last_activity: None,
        }
    }
}

/// Projection of chat messages into the active room's list and the room
/// summaries.
#[derive(Debug)]
pub struct RoomProjection {
    local_user: UserId,
    active_room: Option<RoomId>,
    messages: Vec<ChatMessage>,
    summaries: HashMap<RoomId, RoomSummary>,
}

impl RoomProjection {
    #[must_use]
    pub fn new(local_user: UserId) -> Self {
        Self {
            local_user,
            active_room: None,
            messages: Vec::new(),
            summaries: HashMap::new(),
        }
    }

    /// The currently open room
    pub fn active_room(&self) -> Option<RoomId> {
        self.active_room
    }

    /// Switch the open room: the message list is discarded and the new
    /// room's unread count cleared.
    pub fn set_active_room(&mut self, room_id: Option<RoomId>) {
        self.active_room = room_id;
        self.messages.clear();
        if let Some(room) = room_id {
            if let Some(summary) = self.summaries.get_mut(&room) {
                summary.unread = 0;
            }
        }
    }

    /// Apply a full message payload.
    ///
    /// Appends into the open room's list (de-duplicated by message id) when
    /// the message belongs to it and was not authored by the local user.
    /// Returns true when the message was new.
    pub fn apply_message(&mut self, message: &ChatMessage) -> bool {
        if self.contains_message(message.id) {
            tracing::debug!(message_id = %message.id, "Duplicate message dropped");
            return false;
        }

        self.touch_summary(
            message.room_id,
            Some(message.preview()),
            message.sent_at,
            message.sender_id,
        );

        if self.active_room == Some(message.room_id) && !message.is_authored_by(self.local_user) {
            self.messages.push(message.clone());
        }

        true
    }

    /// Apply a lightweight message notification (no body).
    ///
    /// Updates the room summary; returns true when the id was not already
    /// present in the open room's list.
    pub fn apply_notification(
        &mut self,
        room_id: RoomId,
        message_id: MessageId,
        sender_id: UserId,
        preview: Option<String>,
    ) -> bool {
        if self.contains_message(message_id) {
            tracing::debug!(message_id = %message_id, "Duplicate notification dropped");
            return false;
        }

        self.touch_summary(room_id, preview, Utc::now(), sender_id);
        true
    }

    /// Whether the open room's list already holds the message
    pub fn contains_message(&self, id: MessageId) -> bool {
        self.messages.iter().any(|m| m.id == id)
    }

    /// Snapshot of the open room's messages
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.messages.clone()
    }

    /// Snapshot of the room summaries, most recently active first
    pub fn summaries(&self) -> Vec<RoomSummary> {
        let mut out: Vec<RoomSummary> = self.summaries.values().cloned().collect();
        out.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
        out
    }

    /// Total unread messages across all rooms
    pub fn unread_total(&self) -> u32 {
        self.summaries.values().map(|s| s.unread).sum()
    }

    fn touch_summary(
        &mut self,
        room_id: RoomId,
        preview: Option<String>,
        at: DateTime<Utc>,
        sender_id: UserId,
    ) {
        let summary = self
            .summaries
            .entry(room_id)
            .or_insert_with(|| RoomSummary::new(room_id));

        if preview.is_some() {
            summary.preview = preview;
        }
        summary.last_activity = Some(at);

        // Unread accrues only for messages others sent to rooms we do not
        // currently have open.
        if sender_id != self.local_user && self.active_room != Some(room_id) {
            summary.unread += 1;
        }
    }
}
