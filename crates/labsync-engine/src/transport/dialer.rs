//! Feed dialer
//!
//! Abstracts connection establishment so the adapter can be driven by an
//! in-memory socket in tests. The production dialer speaks WebSocket via
//! `tokio-tungstenite`.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::Message;

use super::{TransportError, ABNORMAL_CLOSURE};

/// Channel buffer size for socket pumps
const SOCKET_BUFFER_SIZE: usize = 64;

/// A frame delivered by a connected socket
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedFrame {
    /// A text payload
    Text(String),
    /// The connection closed with the given close code
    Closed { code: u16, reason: String },
}

/// A connected socket, reduced to a pair of channels.
///
/// Dropping `outbound` closes the underlying connection cleanly.
#[derive(Debug)]
pub struct FeedSocket {
    pub outbound: mpsc::Sender<String>,
    pub inbound: mpsc::Receiver<FeedFrame>,
}

/// Establishes one physical connection per call
#[async_trait]
pub trait FeedDialer: Send + Sync + 'static {
    /// Dial the endpoint, returning a connected socket
    async fn dial(&self, url: &str) -> Result<FeedSocket, TransportError>;
}

/// Production dialer backed by `tokio-tungstenite`
#[derive(Debug, Default)]
pub struct WsDialer;

#[async_trait]
impl FeedDialer for WsDialer {
    async fn dial(&self, url: &str) -> Result<FeedSocket, TransportError> {
        let (stream, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| TransportError::DialFailed(e.to_string()))?;

        let (mut ws_sink, mut ws_stream) = stream.split();
        let (out_tx, mut out_rx) = mpsc::channel::<String>(SOCKET_BUFFER_SIZE);
        let (in_tx, in_rx) = mpsc::channel::<FeedFrame>(SOCKET_BUFFER_SIZE);

        // Writer pump: forwards outbound text, closes the sink when the
        // adapter drops its sender.
        tokio::spawn(async move {
            while let Some(text) = out_rx.recv().await {
                if ws_sink.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            let _ = ws_sink.close().await;
        });

        // Reader pump: forwards inbound text and reports the close code.
        tokio::spawn(async move {
            while let Some(msg) = ws_stream.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        if in_tx.send(FeedFrame::Text(text)).await.is_err() {
                            return;
                        }
                    }
                    Ok(Message::Close(frame)) => {
                        let (code, reason) = frame
                            .map(|f| (u16::from(f.code), f.reason.to_string()))
                            .unwrap_or((ABNORMAL_CLOSURE, String::new()));
                        let _ = in_tx.send(FeedFrame::Closed { code, reason }).await;
                        return;
                    }
                    Ok(Message::Ping(_) | Message::Pong(_)) => {
                        // Control frames answered by the library
                    }
                    Ok(Message::Binary(_) | Message::Frame(_)) => {
                        tracing::debug!("Ignoring non-text frame");
                    }
                    Err(e) => {
                        let _ = in_tx
                            .send(FeedFrame::Closed {
                                code: ABNORMAL_CLOSURE,
                                reason: e.to_string(),
                            })
                            .await;
                        return;
                    }
                }
            }
            // Stream ended without a close frame
            let _ = in_tx
                .send(FeedFrame::Closed {
                    code: ABNORMAL_CLOSURE,
                    reason: "stream ended".to_string(),
                })
                .await;
        });

        Ok(FeedSocket {
            outbound: out_tx,
            inbound: in_rx,
        })
    }
}
