//! Engine error types
//!
//! Nothing in the synchronization engine is fatal to the process: every
//! failure degrades to "stay in last known good state and log".

use labsync_core::UserId;

/// Engine-wide error type
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// A feed dropped unexpectedly; reconnection is automatic
    #[error("Connection lost on {feed} feed")]
    ConnectionLost { feed: &'static str },

    /// The transport was not open; surfaced to the caller, never retried implicitly
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// JSON parse failed and the legacy text fallback did not match
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// Structured payload with a `type` value outside the known vocabulary
    #[error("Unknown message type: {0}")]
    UnknownMessageType(String),

    /// Call-availability probe reported the peer as unavailable
    #[error("User {0} is unavailable for calls")]
    CallUnavailable(UserId),

    /// An offer arrived while a call was already in progress
    #[error("Call collision: a call is already active")]
    CallCollision,

    /// Host command channel returned a failure
    #[error("Command channel error: {0}")]
    Command(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error")]
    Internal(#[source] anyhow::Error),
}

impl SyncError {
    /// Short machine-readable code for notices and logs
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConnectionLost { .. } => "CONNECTION_LOST",
            Self::SendFailed(_) => "SEND_FAILED",
            Self::MalformedPayload(_) => "MALFORMED_PAYLOAD",
            Self::UnknownMessageType(_) => "UNKNOWN_MESSAGE_TYPE",
            Self::CallUnavailable(_) => "CALL_UNAVAILABLE",
            Self::CallCollision => "CALL_COLLISION",
            Self::Command(_) => "COMMAND_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the failure is expected to heal without user action
    #[must_use]
    pub fn is_self_healing(&self) -> bool {
        matches!(
            self,
            Self::ConnectionLost { .. } | Self::MalformedPayload(_) | Self::UnknownMessageType(_)
        )
    }

    /// Create a send failure from any displayable cause
    pub fn send_failed(cause: impl std::fmt::Display) -> Self {
        Self::SendFailed(cause.to_string())
    }

    /// Create an internal error from any error
    pub fn internal(err: impl Into<anyhow::Error>) -> Self {
        Self::Internal(err.into())
    }
}

/// Result type alias for engine operations
pub type SyncResult<T> = Result<T, SyncError>;
