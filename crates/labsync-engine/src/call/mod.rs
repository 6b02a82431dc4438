//! Call signaling
//!
//! State machine for the single active call, driven by signaling messages
//! on the call feed and by local user actions.

mod machine;

pub use machine::{CallEffect, CallEndReason, CallMachine, CallState};
