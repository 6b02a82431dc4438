//! Wire protocol
//!
//! Message formats for the chat feed and the call-signaling feed.

mod call;
mod chat;

pub use call::CallSignal;
pub use chat::{decode_chat_frame, ChatEvent, ClientCommand, InboundChatFrame, RoomOccupant};
