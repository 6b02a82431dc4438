//! Room projection
//!
//! The active room's message list and the per-room preview/unread summaries.

mod projection;

pub use projection::{RoomProjection, RoomSummary};
