//! # labsync-core
//!
//! Domain layer containing identifiers, entities, and the wire protocol for
//! the synchronization engine. This crate has zero dependencies on
//! infrastructure (sockets, runtime, host process).

pub mod entities;
pub mod ids;
pub mod protocol;

// Re-export commonly used types at crate root
pub use entities::{
    CallDirection, CallKind, CallSession, ChatMessage, IncomingOffer, TypingEntry, UserPresence,
    UserStatus,
};
pub use ids::{MessageId, RoomId, UserId};
pub use protocol::{
    decode_chat_frame, CallSignal, ChatEvent, ClientCommand, InboundChatFrame, RoomOccupant,
};
