//! Typing coordination
//!
//! Converts local keystrokes into debounced start/stop signals and tracks
//! which remote users are flagged as typing.

mod coordinator;

pub use coordinator::{TypingCoordinator, TypingSignal};
