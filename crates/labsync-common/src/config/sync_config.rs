//! Engine configuration structs
//!
//! Loads configuration from environment variables with sensible defaults for
//! every tunable except the feed endpoints.

use serde::Deserialize;
use std::env;
use std::time::Duration;

/// Main engine configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    pub env: Environment,
    pub chat_feed: FeedSettings,
    pub call_feed: FeedSettings,
    /// Keep-alive interval on the chat feed
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_interval_secs: u64,
    /// Local typing idle timeout
    #[serde(default = "default_typing_idle_secs")]
    pub typing_idle_secs: u64,
    /// Window during which a second inbound dispatch is dropped
    #[serde(default = "default_guard_window_ms")]
    pub dispatch_guard_ms: u64,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Per-feed transport settings
#[derive(Debug, Clone, Deserialize)]
pub struct FeedSettings {
    pub url: String,
    /// Delay before a reconnect attempt after an abnormal close.
    ///
    /// Fixed rather than exponential; treat as a tunable backoff parameter.
    #[serde(default = "default_reconnect_secs")]
    pub reconnect_delay_secs: u64,
}

impl FeedSettings {
    #[must_use]
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }
}

impl SyncConfig {
    #[must_use]
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    #[must_use]
    pub fn typing_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.typing_idle_secs)
    }

    #[must_use]
    pub fn dispatch_guard_window(&self) -> Duration {
        Duration::from_millis(self.dispatch_guard_ms)
    }

    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if required environment variables are missing
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Ok(Self {
            env: env::var("LABSYNC_ENV")
                .ok()
                .and_then(|s| match s.to_lowercase().as_str() {
                    "production" => Some(Environment::Production),
                    "staging" => Some(Environment::Staging),
                    "development" => Some(Environment::Development),
                    _ => None,
                })
                .unwrap_or_default(),
            chat_feed: FeedSettings {
                url: env::var("CHAT_FEED_URL").map_err(|_| ConfigError::MissingVar("CHAT_FEED_URL"))?,
                reconnect_delay_secs: env_u64("CHAT_FEED_RECONNECT_SECS", default_reconnect_secs()),
            },
            call_feed: FeedSettings {
                url: env::var("CALL_FEED_URL").map_err(|_| ConfigError::MissingVar("CALL_FEED_URL"))?,
                reconnect_delay_secs: env_u64("CALL_FEED_RECONNECT_SECS", default_reconnect_secs()),
            },
            heartbeat_interval_secs: env_u64("HEARTBEAT_INTERVAL_SECS", default_heartbeat_secs()),
            typing_idle_secs: env_u64("TYPING_IDLE_SECS", default_typing_idle_secs()),
            dispatch_guard_ms: env_u64("DISPATCH_GUARD_MS", default_guard_window_ms()),
        })
    }

    /// A configuration suitable for tests: in-memory endpoints, stock defaults
    #[must_use]
    pub fn for_tests() -> Self {
        Self {
            env: Environment::Development,
            chat_feed: FeedSettings {
                url: "mem://chat".to_string(),
                reconnect_delay_secs: default_reconnect_secs(),
            },
            call_feed: FeedSettings {
                url: "mem://call".to_string(),
                reconnect_delay_secs: default_reconnect_secs(),
            },
            heartbeat_interval_secs: default_heartbeat_secs(),
            typing_idle_secs: default_typing_idle_secs(),
            dispatch_guard_ms: default_guard_window_ms(),
        }
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

// Default value functions
fn default_heartbeat_secs() -> u64 {
    30
}

fn default_typing_idle_secs() -> u64 {
    3
}

fn default_reconnect_secs() -> u64 {
    3
}

fn default_guard_window_ms() -> u64 {
    100
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
