//! Engine notices
//!
//! Transient, toast-style notifications for the presentation layer. Nothing
//! here is fatal; a dropped notice is acceptable.

use labsync_core::{CallKind, MessageId, RoomId, UserId};

use crate::call::CallEndReason;

/// Notifications broadcast to subscribed UI components
#[derive(Debug, Clone, PartialEq)]
pub enum EngineNotice {
    /// A feed dropped; reconnection is underway
    FeedDown { feed: &'static str },
    /// A feed (re)connected
    FeedUp { feed: &'static str },
    /// A new message landed in a room
    MessageReceived {
        room_id: RoomId,
        message_id: MessageId,
    },
    /// An incoming call is ringing; distinct from all chat notifications
    IncomingCall {
        from: UserId,
        from_name: String,
        kind: CallKind,
    },
    /// The active call or pending offer went away
    CallEnded { reason: CallEndReason },
    /// The probed peer is unavailable; no call was started
    CallUnavailable { peer: UserId },
    /// An outbound operation was refused by the host
    SendRejected { detail: String },
}
