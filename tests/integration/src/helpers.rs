//! Test harness
//!
//! Runs the full engine against scripted in-memory feeds and a mock host
//! command channel, with deterministic (paused) time.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc};

use labsync_common::SyncConfig;
use labsync_core::UserId;
use labsync_engine::{
    CommandChannel, CommandError, EngineIdentity, EngineNotice, FeedDialer, FeedFrame, FeedSocket,
    SyncEngine, SyncHandle, TransportError,
};

/// The local user every harness engine runs as
pub const LOCAL_USER: UserId = UserId(1);

/// Test-side handles to one scripted socket
pub struct SocketHandle {
    /// Inject inbound frames (text or close) into the adapter
    pub frames: mpsc::Sender<FeedFrame>,
    /// Observe what the engine sends out
    pub outbound: mpsc::Receiver<String>,
}

impl SocketHandle {
    /// Inject an inbound text frame
    pub async fn inject(&self, frame: impl Into<String>) {
        self.frames
            .send(FeedFrame::Text(frame.into()))
            .await
            .expect("adapter gone");
    }

    /// Close the connection with the given code
    pub async fn close(&self, code: u16) {
        self.frames
            .send(FeedFrame::Closed {
                code,
                reason: "scripted close".to_string(),
            })
            .await
            .expect("adapter gone");
    }

    /// Receive the next outbound frame whose `type` matches, skipping others
    /// (heartbeats fire on their own schedule and are filtered here).
    pub async fn next_frame_of_type(&mut self, ty: &str) -> Value {
        loop {
            let frame = tokio::time::timeout(Duration::from_secs(120), self.outbound.recv())
                .await
                .unwrap_or_else(|_| panic!("timed out waiting for frame of type {ty}"))
                .expect("outbound channel closed");
            let value: Value = serde_json::from_str(&frame).expect("outbound frame is not JSON");
            if value["type"] == ty {
                return value;
            }
        }
    }

    /// Drain whatever outbound frames are queued right now
    pub fn drain_outbound(&mut self) -> Vec<Value> {
        let mut out = Vec::new();
        while let Ok(frame) = self.outbound.try_recv() {
            out.push(serde_json::from_str(&frame).expect("outbound frame is not JSON"));
        }
        out
    }
}

/// Dialer handing out pre-scripted sockets, one per dial
#[derive(Default)]
pub struct ScriptedDialer {
    dials: AtomicUsize,
    sockets: Mutex<VecDeque<FeedSocket>>,
}

impl ScriptedDialer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn dial_count(&self) -> usize {
        self.dials.load(Ordering::SeqCst)
    }

    /// Script the next dial to succeed; returns the test-side handles
    pub fn push_socket(&self) -> SocketHandle {
        let (out_tx, out_rx) = mpsc::channel(64);
        let (in_tx, in_rx) = mpsc::channel(64);
        self.sockets.lock().push_back(FeedSocket {
            outbound: out_tx,
            inbound: in_rx,
        });
        SocketHandle {
            frames: in_tx,
            outbound: out_rx,
        }
    }
}

#[async_trait]
impl FeedDialer for ScriptedDialer {
    async fn dial(&self, _url: &str) -> Result<FeedSocket, TransportError> {
        self.dials.fetch_add(1, Ordering::SeqCst);
        self.sockets
            .lock()
            .pop_front()
            .ok_or_else(|| TransportError::DialFailed("no socket scripted".to_string()))
    }
}

/// Mock host command channel: records sends, configurable probe result,
/// in-memory file store.
pub struct MockCommandChannel {
    pub sent: Mutex<Vec<String>>,
    pub available: AtomicBool,
    pub files: Mutex<HashMap<String, String>>,
    next_file_id: AtomicUsize,
}

impl MockCommandChannel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            available: AtomicBool::new(true),
            files: Mutex::new(HashMap::new()),
            next_file_id: AtomicUsize::new(1),
        })
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn sent_payloads(&self) -> Vec<String> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl CommandChannel for MockCommandChannel {
    async fn send_chat_raw(&self, payload: &str) -> Result<(), CommandError> {
        self.sent.lock().push(payload.to_string());
        Ok(())
    }

    async fn probe_call_availability(&self, _user_id: UserId) -> Result<bool, CommandError> {
        Ok(self.available.load(Ordering::SeqCst))
    }

    async fn upload_file(
        &self,
        _file_name: &str,
        content_base64: &str,
    ) -> Result<String, CommandError> {
        let id = format!("file-{}", self.next_file_id.fetch_add(1, Ordering::SeqCst));
        self.files
            .lock()
            .insert(id.clone(), content_base64.to_string());
        Ok(id)
    }

    async fn download_file(&self, file_id: &str) -> Result<String, CommandError> {
        self.files
            .lock()
            .get(file_id)
            .cloned()
            .ok_or_else(|| CommandError::Rejected(format!("unknown file {file_id}")))
    }
}

/// A running engine plus every test-side handle
pub struct Harness {
    pub handle: SyncHandle,
    pub notices: broadcast::Receiver<EngineNotice>,
    pub chat: SocketHandle,
    pub call: SocketHandle,
    pub chat_dialer: Arc<ScriptedDialer>,
    pub call_dialer: Arc<ScriptedDialer>,
    pub commands: Arc<MockCommandChannel>,
}

impl Harness {
    /// Spawn an engine wired to scripted feeds; both feeds connect on start
    pub async fn start() -> Self {
        let chat_dialer = ScriptedDialer::new();
        let call_dialer = ScriptedDialer::new();
        let chat = chat_dialer.push_socket();
        let call = call_dialer.push_socket();
        let commands = MockCommandChannel::new();

        let (engine, handle) = SyncEngine::new(
            SyncConfig::for_tests(),
            EngineIdentity {
                user_id: LOCAL_USER,
                user_name: "me".to_string(),
            },
            chat_dialer.clone(),
            call_dialer.clone(),
            commands.clone(),
        );

        let notices = handle.subscribe();
        tokio::spawn(engine.run());
        settle().await;

        Self {
            handle,
            notices,
            chat,
            call,
            chat_dialer,
            call_dialer,
            commands,
        }
    }

    /// Wait for a specific notice, skipping unrelated ones
    pub async fn expect_notice(
        &mut self,
        predicate: impl Fn(&EngineNotice) -> bool,
    ) -> EngineNotice {
        loop {
            let notice = tokio::time::timeout(Duration::from_secs(120), self.notices.recv())
                .await
                .expect("timed out waiting for notice")
                .expect("notice channel closed");
            if predicate(&notice) {
                return notice;
            }
        }
    }
}

/// Let the engine task drain its queues
pub async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}

/// Sleep past the dispatch guard window so the next inbound frame is admitted
pub async fn clear_guard_window() {
    tokio::time::sleep(Duration::from_millis(150)).await;
    settle().await;
}
