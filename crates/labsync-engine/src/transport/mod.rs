//! Transport layer
//!
//! One feed adapter per logical feed (chat, call signaling). The adapter owns
//! a single physical connection at a time and the reconnection policy.

mod dialer;
mod feed;

pub use dialer::{FeedDialer, FeedFrame, FeedSocket, WsDialer};
pub use feed::{FeedAdapter, FeedConfig, FeedEvent, FeedState};

/// WebSocket normal-closure code; anything else counts as abnormal
pub const NORMAL_CLOSURE: u16 = 1000;

/// Synthetic close code for streams that end without a close frame
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Transport layer errors
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The feed is not in the Open state; the caller decides whether to drop
    #[error("Feed is not connected")]
    NotConnected,

    #[error("Dial failed: {0}")]
    DialFailed(String),

    #[error("Send failed: {0}")]
    SendFailed(String),
}
