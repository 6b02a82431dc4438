//! Configuration
//!
//! Environment-driven settings for the synchronization engine.

mod sync_config;

pub use sync_config::{ConfigError, Environment, FeedSettings, SyncConfig};
