//! Error handling
//!
//! Unified error taxonomy for the synchronization engine.

mod sync_error;

pub use sync_error::{SyncError, SyncResult};
