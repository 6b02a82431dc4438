//! Host command channel
//!
//! Typed request/response boundary to the host-controlled backend process:
//! raw chat sends, call-availability probes, and base64 file transfer. The
//! engine never assumes retries happen beneath this interface.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use labsync_common::SyncError;
use labsync_core::UserId;

/// Command channel errors, as reported by the host
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// The host processed the call and refused it
    #[error("Host rejected the call: {0}")]
    Rejected(String),

    /// The call never reached the host
    #[error("Host transport failure: {0}")]
    Transport(String),
}

/// Request/response calls into the host process
#[async_trait]
pub trait CommandChannel: Send + Sync {
    /// Send a raw string over the chat feed
    async fn send_chat_raw(&self, payload: &str) -> Result<(), CommandError>;

    /// Probe whether a user can receive a call right now
    async fn probe_call_availability(&self, user_id: UserId) -> Result<bool, CommandError>;

    /// Upload file content (base64); returns the stored file id
    async fn upload_file(&self, file_name: &str, content_base64: &str)
        -> Result<String, CommandError>;

    /// Download file content (base64) by id
    async fn download_file(&self, file_id: &str) -> Result<String, CommandError>;
}

/// A command channel with no host attached; every call fails descriptively.
///
/// Used by the feed monitor binary, which only observes traffic.
#[derive(Debug, Default)]
pub struct DetachedCommandChannel;

#[async_trait]
impl CommandChannel for DetachedCommandChannel {
    async fn send_chat_raw(&self, _payload: &str) -> Result<(), CommandError> {
        Err(CommandError::Transport("no host attached".to_string()))
    }

    async fn probe_call_availability(&self, _user_id: UserId) -> Result<bool, CommandError> {
        Err(CommandError::Transport("no host attached".to_string()))
    }

    async fn upload_file(
        &self,
        _file_name: &str,
        _content_base64: &str,
    ) -> Result<String, CommandError> {
        Err(CommandError::Transport("no host attached".to_string()))
    }

    async fn download_file(&self, _file_id: &str) -> Result<String, CommandError> {
        Err(CommandError::Transport("no host attached".to_string()))
    }
}

/// Encode attachment bytes for the upload call
#[must_use]
pub fn encode_attachment(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode downloaded attachment content
pub fn decode_attachment(content_base64: &str) -> Result<Vec<u8>, SyncError> {
    STANDARD
        .decode(content_base64.trim())
        .map_err(|e| SyncError::MalformedPayload(format!("invalid base64 attachment: {e}")))
}
