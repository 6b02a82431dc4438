//! Domain entities
//!
//! Presence, typing, call, and message state owned by the engine components.

mod call;
mod message;
mod presence;

pub use call::{CallDirection, CallKind, CallSession, IncomingOffer};
pub use message::ChatMessage;
pub use presence::{TypingEntry, UserPresence, UserStatus};
