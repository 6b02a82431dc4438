//! # labsync-engine
//!
//! The real-time synchronization engine backing chat presence, typing
//! indicators, and call signaling: connection lifecycle with reconnection,
//! an idempotent inbound dispatcher with a reentrancy guard, a presence
//! tracker reconciling three update sources, a debounced typing coordinator,
//! and a call-signaling state machine.

pub mod call;
pub mod commands;
pub mod dispatch;
pub mod engine;
pub mod notify;
pub mod presence;
pub mod rooms;
pub mod transport;
pub mod typing;

// Re-export the engine surface at crate root
pub use call::{CallEffect, CallEndReason, CallMachine, CallState};
pub use commands::{
    decode_attachment, encode_attachment, CommandChannel, CommandError, DetachedCommandChannel,
};
pub use dispatch::{DispatchGuard, InboundDispatcher};
pub use engine::{EngineIdentity, LocalAction, SyncEngine, SyncHandle};
pub use notify::EngineNotice;
pub use presence::PresenceTracker;
pub use rooms::{RoomProjection, RoomSummary};
pub use transport::{
    FeedAdapter, FeedConfig, FeedDialer, FeedEvent, FeedFrame, FeedSocket, FeedState,
    TransportError, WsDialer,
};
pub use typing::{TypingCoordinator, TypingSignal};
