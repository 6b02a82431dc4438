//! Presence tracking
//!
//! Reconciles three independent update sources into one consistent map.

mod tracker;

pub use tracker::PresenceTracker;
