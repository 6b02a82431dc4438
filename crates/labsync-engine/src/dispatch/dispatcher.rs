//! Inbound dispatcher
//!
//! Deserializes each chat-feed frame, determines its kind, and invokes
//! exactly one handler. While a dispatch is in flight (plus the guard
//! window after it) further frames are dropped, not queued. This is the
//! documented ordering exception that collapses duplicate-notification bursts.

use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::broadcast;

use labsync_core::{decode_chat_frame, ChatEvent, ClientCommand, InboundChatFrame, UserId};

use crate::notify::EngineNotice;
use crate::presence::PresenceTracker;
use crate::rooms::RoomProjection;
use crate::typing::TypingCoordinator;

use super::DispatchGuard;

/// Routes inbound chat frames to the presence tracker, typing coordinator,
/// and room projection. Returns at most one immediate reply command.
pub struct InboundDispatcher {
    guard: DispatchGuard,
    local_user: UserId,
    presence: Arc<PresenceTracker>,
    typing: Arc<TypingCoordinator>,
    rooms: Arc<RwLock<RoomProjection>>,
    notices: broadcast::Sender<EngineNotice>,
}

impl InboundDispatcher {
    pub fn new(
        guard: DispatchGuard,
        local_user: UserId,
        presence: Arc<PresenceTracker>,
        typing: Arc<TypingCoordinator>,
        rooms: Arc<RwLock<RoomProjection>>,
        notices: broadcast::Sender<EngineNotice>,
    ) -> Self {
        Self {
            guard,
            local_user,
            presence,
            typing,
            rooms,
            notices,
        }
    }

    /// Dispatch one raw frame.
    ///
    /// Frames arriving while the guard slot is held are dropped. Returns a
    /// reply command to send back over the feed, if the message demands one.
    pub fn dispatch(&self, raw: &str) -> Option<ClientCommand> {
        let Some(_permit) = self.guard.try_acquire() else {
            tracing::debug!("Frame dropped inside dispatch guard window");
            return None;
        };

        match decode_chat_frame(raw) {
            InboundChatFrame::Event(event) => self.handle_event(event),
            InboundChatFrame::ConnectionConfirmed(text) => {
                tracing::debug!(text = %text, "Connection confirmed by backend");
                None
            }
            InboundChatFrame::Unrecognized { kind } => {
                tracing::warn!(kind = %kind, "Unknown message type, dropped");
                None
            }
            InboundChatFrame::Malformed => {
                tracing::warn!(len = raw.len(), "Malformed payload, dropped");
                None
            }
        }
    }

    fn handle_event(&self, event: ChatEvent) -> Option<ClientCommand> {
        match event {
            ChatEvent::ChatMessage(message) => {
                let appended = self.rooms.write().apply_message(&message);
                if appended && !message.is_authored_by(self.local_user) {
                    let _ = self.notices.send(EngineNotice::MessageReceived {
                        room_id: message.room_id,
                        message_id: message.id,
                    });
                }
                None
            }
            ChatEvent::ChatMessageNotification {
                room_id,
                message_id,
                sender_id,
                preview,
                ..
            } => {
                let fresh = self
                    .rooms
                    .write()
                    .apply_notification(room_id, message_id, sender_id, preview);
                if fresh && sender_id != self.local_user {
                    let _ = self.notices.send(EngineNotice::MessageReceived {
                        room_id,
                        message_id,
                    });
                }
                None
            }
            ChatEvent::UserOnlineStatus {
                user_id,
                user_name,
                is_online,
                last_seen,
            } => {
                self.presence
                    .apply_global_status(user_id, &user_name, is_online, last_seen);
                None
            }
            ChatEvent::ChatOnlineUsers { room_id, users } => {
                self.presence.apply_room_snapshot(room_id, &users);
                None
            }
            ChatEvent::UserStatusUpdate {
                room_id,
                user_id,
                user_name,
                status,
            } => {
                self.presence
                    .apply_room_status_delta(room_id, user_id, &user_name, status);
                None
            }
            ChatEvent::UserTyping {
                room_id,
                user_id,
                user_name,
                is_typing,
            } => {
                self.typing
                    .apply_remote(room_id, user_id, &user_name, is_typing);
                None
            }
            // Server-initiated keep-alive: acknowledge immediately
            ChatEvent::Heartbeat => Some(ClientCommand::Heartbeat),
        }
    }
}

impl std::fmt::Debug for InboundDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InboundDispatcher")
            .field("local_user", &self.local_user)
            .field("guard_held", &self.guard.is_held())
            .finish()
    }
}
