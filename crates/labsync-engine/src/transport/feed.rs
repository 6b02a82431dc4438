//! Feed adapter
//!
//! Owns one physical connection per feed and the reconnect-on-abnormal-close
//! policy. The connection is recreated, never mutated, on each attempt.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{FeedDialer, FeedFrame, TransportError, ABNORMAL_CLOSURE, NORMAL_CLOSURE};

/// Feed connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedState {
    Connecting,
    Open,
    Closing,
    Closed,
}

/// Events delivered to the adapter's owner
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    /// The feed transitioned to Open
    Opened,
    /// A raw inbound frame
    Frame(String),
    /// The feed closed with the given code
    Closed { code: u16, reason: String },
}

/// Per-feed adapter configuration
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Short feed name for logs ("chat", "call")
    pub name: &'static str,
    pub url: String,
    /// Fixed delay before a reconnect attempt after an abnormal close
    pub reconnect_delay: Duration,
}

/// Owns one feed's connection lifecycle.
///
/// Invariant: never two concurrent connections for the same feed. `connect`
/// is a no-op while Connecting or Open, and a single reconnect-pending flag
/// prevents overlapping reconnect schedules.
pub struct FeedAdapter {
    config: FeedConfig,
    dialer: Arc<dyn FeedDialer>,
    events: mpsc::Sender<FeedEvent>,
    state: Mutex<FeedState>,
    retry_count: AtomicU32,
    last_error: Mutex<Option<String>>,
    outbound: Mutex<Option<mpsc::Sender<String>>>,
    reconnect_pending: AtomicBool,
    reconnect_timer: Mutex<Option<JoinHandle<()>>>,
    pump: Mutex<Option<JoinHandle<()>>>,
    shutting_down: AtomicBool,
}

impl FeedAdapter {
    /// Create a new adapter; events are delivered on the returned channel
    pub fn new(
        config: FeedConfig,
        dialer: Arc<dyn FeedDialer>,
    ) -> (Arc<Self>, mpsc::Receiver<FeedEvent>) {
        let (tx, rx) = mpsc::channel(256);
        let adapter = Arc::new(Self {
            config,
            dialer,
            events: tx,
            state: Mutex::new(FeedState::Closed),
            retry_count: AtomicU32::new(0),
            last_error: Mutex::new(None),
            outbound: Mutex::new(None),
            reconnect_pending: AtomicBool::new(false),
            reconnect_timer: Mutex::new(None),
            pump: Mutex::new(None),
            shutting_down: AtomicBool::new(false),
        });
        (adapter, rx)
    }

    /// Current connection state
    pub fn state(&self) -> FeedState {
        *self.state.lock()
    }

    /// Consecutive failed attempts since the last successful open
    pub fn retry_count(&self) -> u32 {
        self.retry_count.load(Ordering::SeqCst)
    }

    /// Last dial or close error, if any
    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }

    /// Establish the connection.
    ///
    /// No-op when the feed is already Connecting or Open.
    pub async fn connect(self: Arc<Self>) {
        {
            let mut state = self.state.lock();
            match *state {
                FeedState::Connecting | FeedState::Open => {
                    tracing::debug!(feed = self.config.name, state = ?*state, "Connect is a no-op");
                    return;
                }
                FeedState::Closing | FeedState::Closed => {
                    *state = FeedState::Connecting;
                }
            }
        }

        tracing::debug!(feed = self.config.name, url = %self.config.url, "Dialing feed");

        match self.dialer.dial(&self.config.url).await {
            Ok(socket) => {
                *self.state.lock() = FeedState::Open;
                *self.outbound.lock() = Some(socket.outbound);
                self.retry_count.store(0, Ordering::SeqCst);
                *self.last_error.lock() = None;

                tracing::info!(feed = self.config.name, "Feed connected");
                let _ = self.events.send(FeedEvent::Opened).await;

                let pump = tokio::spawn(Self::pump(Arc::clone(&self), socket.inbound));
                if let Some(old) = self.pump.lock().replace(pump) {
                    old.abort();
                }
            }
            Err(e) => {
                *self.state.lock() = FeedState::Closed;
                *self.last_error.lock() = Some(e.to_string());
                self.retry_count.fetch_add(1, Ordering::SeqCst);

                tracing::warn!(
                    feed = self.config.name,
                    error = %e,
                    retry = self.retry_count(),
                    "Dial failed"
                );

                // A failed dial counts as an abnormal close and chains the
                // next attempt.
                Self::schedule_reconnect(Arc::clone(&self));
            }
        }
    }

    /// Send a text frame.
    ///
    /// Fails with `NotConnected` unless the feed is Open; the caller decides
    /// whether to drop. Outbound frames are never buffered across disconnects.
    pub async fn send(&self, text: &str) -> Result<(), TransportError> {
        if self.state() != FeedState::Open {
            return Err(TransportError::NotConnected);
        }

        let sender = self
            .outbound
            .lock()
            .clone()
            .ok_or(TransportError::NotConnected)?;

        sender
            .send(text.to_string())
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    /// Intentional close: suppresses reconnection and cancels pending timers
    pub fn close(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
        *self.state.lock() = FeedState::Closing;

        if let Some(timer) = self.reconnect_timer.lock().take() {
            timer.abort();
        }
        if let Some(pump) = self.pump.lock().take() {
            pump.abort();
        }
        // Dropping the outbound sender closes the socket cleanly
        *self.outbound.lock() = None;
        *self.state.lock() = FeedState::Closed;

        tracing::info!(feed = self.config.name, "Feed closed");
    }

    /// Forward inbound frames until the socket reports closure
    async fn pump(adapter: Arc<Self>, mut inbound: mpsc::Receiver<FeedFrame>) {
        loop {
            match inbound.recv().await {
                Some(FeedFrame::Text(text)) => {
                    if adapter.events.send(FeedEvent::Frame(text)).await.is_err() {
                        return;
                    }
                }
                Some(FeedFrame::Closed { code, reason }) => {
                    Self::handle_closed(adapter, code, reason).await;
                    return;
                }
                None => {
                    // Socket dropped without a close frame
                    Self::handle_closed(adapter, ABNORMAL_CLOSURE, "stream ended".to_string())
                        .await;
                    return;
                }
            }
        }
    }

    /// React to a connection closure reported by the socket
    async fn handle_closed(adapter: Arc<Self>, code: u16, reason: String) {
        *adapter.state.lock() = FeedState::Closed;
        *adapter.outbound.lock() = None;
        if code != NORMAL_CLOSURE {
            *adapter.last_error.lock() = Some(format!("closed with code {code}: {reason}"));
        }

        tracing::info!(
            feed = adapter.config.name,
            code = code,
            reason = %reason,
            "Feed connection closed"
        );

        let _ = adapter
            .events
            .send(FeedEvent::Closed {
                code,
                reason: reason.clone(),
            })
            .await;

        // Normal closure means the peer went away intentionally; anything
        // else gets exactly one scheduled reconnect attempt.
        if code != NORMAL_CLOSURE && !adapter.shutting_down.load(Ordering::SeqCst) {
            Self::schedule_reconnect(adapter);
        }
    }

    /// Schedule a single reconnect attempt after the fixed delay
    fn schedule_reconnect(adapter: Arc<Self>) {
        if adapter.reconnect_pending.swap(true, Ordering::SeqCst) {
            tracing::debug!(feed = adapter.config.name, "Reconnect already pending");
            return;
        }

        let delay = adapter.config.reconnect_delay;
        tracing::debug!(
            feed = adapter.config.name,
            delay_ms = delay.as_millis() as u64,
            "Reconnect scheduled"
        );

        let timer = tokio::spawn({
            let adapter = Arc::clone(&adapter);
            async move {
                tokio::time::sleep(delay).await;
                adapter.reconnect_pending.store(false, Ordering::SeqCst);
                if !adapter.shutting_down.load(Ordering::SeqCst) {
                    Arc::clone(&adapter).connect().await;
                }
            }
        });

        if let Some(old) = adapter.reconnect_timer.lock().replace(timer) {
            old.abort();
        }
    }
}

impl std::fmt::Debug for FeedAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedAdapter")
            .field("feed", &self.config.name)
            .field("state", &self.state())
            .field("retry_count", &self.retry_count())
            .finish()
    }
}
