//! Inbound dispatch
//!
//! Classifies each inbound chat frame and routes it to exactly one handler,
//! with an at-most-one-in-flight reentrancy guard.

mod dispatcher;
mod guard;

pub use dispatcher::InboundDispatcher;
pub use guard::{DispatchGuard, DispatchPermit};
