//! Sync engine
//!
//! Owns both feed adapters and every component's state, consuming one merged
//! event stream (feed events, typing signals, local actions, heartbeat
//! ticks) on a single task. The presentation layer holds a [`SyncHandle`]:
//! read access to state plus an action channel, so all mutation goes through
//! the engine loop.

use parking_lot::RwLock;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use labsync_common::{SyncConfig, SyncError, SyncResult};
use labsync_core::{
    CallKind, CallSignal, ChatMessage, ClientCommand, RoomId, UserId, UserPresence, UserStatus,
};

use crate::call::{CallEffect, CallMachine, CallState};
use crate::commands::CommandChannel;
use crate::dispatch::{DispatchGuard, InboundDispatcher};
use crate::notify::EngineNotice;
use crate::presence::PresenceTracker;
use crate::rooms::{RoomProjection, RoomSummary};
use crate::transport::{FeedAdapter, FeedConfig, FeedDialer, FeedEvent, FeedState};
use crate::typing::{TypingCoordinator, TypingSignal};

/// Channel buffer for local actions
const ACTION_BUFFER_SIZE: usize = 64;

/// Buffer for UI notices
const NOTICE_BUFFER_SIZE: usize = 64;

/// The local user this engine synchronizes for
#[derive(Debug, Clone)]
pub struct EngineIdentity {
    pub user_id: UserId,
    pub user_name: String,
}

/// Local user-initiated operations, delivered into the engine loop
#[derive(Debug, Clone)]
pub enum LocalAction {
    SetActiveRoom(Option<RoomId>),
    Keystroke,
    SendMessage(String),
    SetStatus(UserStatus),
    InitiateCall {
        peer: UserId,
        peer_name: String,
        kind: CallKind,
    },
    AcceptCall,
    RejectCall,
    EndCall,
    Shutdown,
}

/// The synchronization engine. Created with [`SyncEngine::new`], driven by
/// [`SyncEngine::run`] on its own task.
pub struct SyncEngine {
    engine_id: Uuid,
    identity: EngineIdentity,
    config: SyncConfig,
    chat_feed: Arc<FeedAdapter>,
    call_feed: Arc<FeedAdapter>,
    chat_events: mpsc::Receiver<FeedEvent>,
    call_events: mpsc::Receiver<FeedEvent>,
    dispatcher: InboundDispatcher,
    presence: Arc<PresenceTracker>,
    typing: Arc<TypingCoordinator>,
    typing_signals: mpsc::UnboundedReceiver<TypingSignal>,
    call: Arc<CallMachine>,
    rooms: Arc<RwLock<RoomProjection>>,
    commands: Arc<dyn CommandChannel>,
    actions: mpsc::Receiver<LocalAction>,
    notices: broadcast::Sender<EngineNotice>,
}

impl SyncEngine {
    /// Build an engine and its handle
    pub fn new(
        config: SyncConfig,
        identity: EngineIdentity,
        chat_dialer: Arc<dyn FeedDialer>,
        call_dialer: Arc<dyn FeedDialer>,
        commands: Arc<dyn CommandChannel>,
    ) -> (Self, SyncHandle) {
        let (notices, _) = broadcast::channel(NOTICE_BUFFER_SIZE);
        let (action_tx, action_rx) = mpsc::channel(ACTION_BUFFER_SIZE);

        let presence = Arc::new(PresenceTracker::new(identity.user_id));
        let (typing, typing_signals) =
            TypingCoordinator::new(identity.user_id, config.typing_idle_timeout());
        let call = Arc::new(CallMachine::new(identity.user_id, identity.user_name.clone()));
        let rooms = Arc::new(RwLock::new(RoomProjection::new(identity.user_id)));

        let (chat_feed, chat_events) = FeedAdapter::new(
            FeedConfig {
                name: "chat",
                url: config.chat_feed.url.clone(),
                reconnect_delay: config.chat_feed.reconnect_delay(),
            },
            chat_dialer,
        );
        // The call feed endpoint is addressed by the local user id
        let call_url = format!(
            "{}/{}",
            config.call_feed.url.trim_end_matches('/'),
            identity.user_id
        );
        let (call_feed, call_events) = FeedAdapter::new(
            FeedConfig {
                name: "call",
                url: call_url,
                reconnect_delay: config.call_feed.reconnect_delay(),
            },
            call_dialer,
        );

        let dispatcher = InboundDispatcher::new(
            DispatchGuard::new(config.dispatch_guard_window()),
            identity.user_id,
            Arc::clone(&presence),
            Arc::clone(&typing),
            Arc::clone(&rooms),
            notices.clone(),
        );

        let handle = SyncHandle {
            actions: action_tx,
            notices: notices.clone(),
            presence: Arc::clone(&presence),
            typing: Arc::clone(&typing),
            call: Arc::clone(&call),
            rooms: Arc::clone(&rooms),
            chat_feed: Arc::clone(&chat_feed),
            call_feed: Arc::clone(&call_feed),
            commands: Arc::clone(&commands),
        };

        let engine = Self {
            engine_id: Uuid::new_v4(),
            identity,
            config,
            chat_feed,
            call_feed,
            chat_events,
            call_events,
            dispatcher,
            presence,
            typing,
            typing_signals,
            call,
            rooms,
            commands,
            actions: action_rx,
            notices,
        };

        (engine, handle)
    }

    /// Run the engine until shutdown
    pub async fn run(mut self) {
        tracing::info!(
            engine_id = %self.engine_id,
            user_id = %self.identity.user_id,
            "Sync engine starting"
        );

        Arc::clone(&self.chat_feed).connect().await;
        Arc::clone(&self.call_feed).connect().await;

        let mut heartbeat = tokio::time::interval(self.config.heartbeat_interval());
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; consume it so the interval
        // starts counting from now.
        heartbeat.tick().await;

        loop {
            tokio::select! {
                Some(event) = self.chat_events.recv() => self.on_chat_event(event).await,
                Some(event) = self.call_events.recv() => self.on_call_event(event).await,
                Some(signal) = self.typing_signals.recv() => self.on_typing_signal(signal).await,
                action = self.actions.recv() => match action {
                    Some(LocalAction::Shutdown) | None => break,
                    Some(action) => self.on_action(action).await,
                },
                _ = heartbeat.tick() => self.send_heartbeat().await,
            }
        }

        self.teardown();
    }

    fn teardown(&self) {
        self.typing.shutdown();
        self.chat_feed.close();
        self.call_feed.close();
        tracing::info!(engine_id = %self.engine_id, "Sync engine stopped");
    }

    async fn on_chat_event(&mut self, event: FeedEvent) {
        match event {
            FeedEvent::Opened => {
                let _ = self.notices.send(EngineNotice::FeedUp { feed: "chat" });
                // Rejoin the open room and re-request its presence; the
                // tracker never guesses after a reconnect.
                let active = self.rooms.read().active_room();
                if let Some(room) = active {
                    self.send_chat_command(&ClientCommand::JoinChat {
                        room_id: room,
                        user_id: self.identity.user_id,
                        user_name: self.identity.user_name.clone(),
                    })
                    .await;
                    self.send_chat_command(&ClientCommand::RequestOnlineUsers { room_id: room })
                        .await;
                }
            }
            FeedEvent::Frame(text) => {
                if let Some(reply) = self.dispatcher.dispatch(&text) {
                    self.send_chat_command(&reply).await;
                }
            }
            FeedEvent::Closed { code, reason } => {
                tracing::warn!(code, reason = %reason, "Chat feed closed");
                let _ = self.notices.send(EngineNotice::FeedDown { feed: "chat" });
            }
        }
    }

    async fn on_call_event(&mut self, event: FeedEvent) {
        match event {
            FeedEvent::Opened => {
                let _ = self.notices.send(EngineNotice::FeedUp { feed: "call" });
            }
            FeedEvent::Frame(text) => match CallSignal::from_json(&text) {
                Ok(signal) => {
                    let effects = self.call.on_signal(signal);
                    self.perform_call_effects(effects).await;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Malformed call signal, dropped");
                }
            },
            FeedEvent::Closed { code, reason } => {
                tracing::warn!(code, reason = %reason, "Call feed closed");
                let _ = self.notices.send(EngineNotice::FeedDown { feed: "call" });
            }
        }
    }

    async fn on_typing_signal(&self, signal: TypingSignal) {
        let command = match signal {
            TypingSignal::Start { room_id } => ClientCommand::TypingStart {
                room_id,
                user_id: self.identity.user_id,
                user_name: self.identity.user_name.clone(),
            },
            TypingSignal::Stop { room_id } => ClientCommand::TypingStop {
                room_id,
                user_id: self.identity.user_id,
            },
        };

        // Typing indicators are best-effort and self-healing via the peer's
        // idle timeout; a failed send is logged, never retried.
        match command.to_json() {
            Ok(frame) => {
                if let Err(e) = self.chat_feed.send(&frame).await {
                    tracing::debug!(error = %e, "Typing signal not sent");
                }
            }
            Err(e) => tracing::warn!(error = %e, "Failed to encode typing signal"),
        }
    }

    async fn on_action(&mut self, action: LocalAction) {
        match action {
            LocalAction::SetActiveRoom(next) => self.switch_room(next).await,
            LocalAction::Keystroke => {
                if let Some(room) = self.rooms.read().active_room() {
                    self.typing.keystroke(room);
                }
                self.flush_typing_signals().await;
            }
            LocalAction::SendMessage(content) => self.send_message(content).await,
            LocalAction::SetStatus(status) => {
                let active = self.rooms.read().active_room();
                if let Some(room) = active {
                    self.send_chat_command(&ClientCommand::UpdateStatus {
                        room_id: room,
                        user_id: self.identity.user_id,
                        status,
                    })
                    .await;
                }
            }
            LocalAction::InitiateCall {
                peer,
                peer_name,
                kind,
            } => self.initiate_call(peer, peer_name, kind).await,
            LocalAction::AcceptCall => {
                let effects = self.call.accept();
                self.perform_call_effects(effects).await;
            }
            LocalAction::RejectCall => {
                let effects = self.call.reject();
                self.perform_call_effects(effects).await;
            }
            LocalAction::EndCall => {
                let effects = self.call.end();
                self.perform_call_effects(effects).await;
            }
            LocalAction::Shutdown => {
                // Intercepted by the run loop before reaching here
                tracing::error!("Shutdown action leaked into the handler");
            }
        }
    }

    async fn switch_room(&mut self, next: Option<RoomId>) {
        let previous = self.rooms.read().active_room();
        if previous == next {
            return;
        }

        // Stop-typing for the old room must go out before we leave it
        self.typing.set_active_room(next);
        self.flush_typing_signals().await;

        if let Some(prev) = previous {
            self.send_chat_command(&ClientCommand::LeaveChat {
                room_id: prev,
                user_id: self.identity.user_id,
            })
            .await;
        }

        self.presence.set_active_room(next);
        self.rooms.write().set_active_room(next);

        if let Some(room) = next {
            self.send_chat_command(&ClientCommand::JoinChat {
                room_id: room,
                user_id: self.identity.user_id,
                user_name: self.identity.user_name.clone(),
            })
            .await;
            self.send_chat_command(&ClientCommand::RequestOnlineUsers { room_id: room })
                .await;
        }

        tracing::debug!(previous = ?previous, next = ?next, "Active room switched");
    }

    async fn send_message(&mut self, content: String) {
        // Sending a message stops typing immediately, bypassing the timer
        self.typing.message_sent();
        self.flush_typing_signals().await;

        let Some(room) = self.rooms.read().active_room() else {
            tracing::warn!("Send with no active room, dropped");
            return;
        };

        let payload = json!({
            "type": "chat_message",
            "room_id": room,
            "sender_id": self.identity.user_id,
            "sender_name": self.identity.user_name,
            "content": content,
        })
        .to_string();

        if let Err(e) = self.commands.send_chat_raw(&payload).await {
            tracing::warn!(error = %e, "Message send failed");
            let _ = self.notices.send(EngineNotice::SendRejected {
                detail: e.to_string(),
            });
        }
    }

    async fn initiate_call(&mut self, peer: UserId, peer_name: String, kind: CallKind) {
        if matches!(self.call.snapshot(), CallState::Active(_)) {
            tracing::warn!(peer = %peer, "Initiate while a call is active, refused");
            return;
        }

        // Probe availability before any transition: an unavailable peer
        // surfaces a busy notice and the machine never leaves Idle.
        let available = self.commands.probe_call_availability(peer).await;
        match available {
            Ok(true) => {
                let effects = self.call.begin_outgoing(peer, peer_name, kind);
                self.perform_call_effects(effects).await;
            }
            Ok(false) => {
                tracing::info!(peer = %peer, "Peer unavailable for calls");
                let _ = self.notices.send(EngineNotice::CallUnavailable { peer });
            }
            Err(e) => {
                tracing::warn!(peer = %peer, error = %e, "Availability probe failed");
                let _ = self.notices.send(EngineNotice::CallUnavailable { peer });
            }
        }
    }

    async fn perform_call_effects(&self, effects: Vec<CallEffect>) {
        for effect in effects {
            match effect {
                CallEffect::Send(signal) => match signal.to_json() {
                    Ok(frame) => {
                        // State transitions are already committed; a failed
                        // send here must not resurrect the session.
                        if let Err(e) = self.call_feed.send(&frame).await {
                            tracing::warn!(error = %e, "Call signal not sent");
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "Failed to encode call signal"),
                },
                CallEffect::RingIncoming {
                    from,
                    from_name,
                    kind,
                } => {
                    let _ = self.notices.send(EngineNotice::IncomingCall {
                        from,
                        from_name,
                        kind,
                    });
                }
                CallEffect::SessionEnded { reason } => {
                    let _ = self.notices.send(EngineNotice::CallEnded { reason });
                }
            }
        }
    }

    /// Drain pending typing signals so ordering against subsequent commands
    /// (leave/join, message sends) is preserved.
    async fn flush_typing_signals(&mut self) {
        while let Ok(signal) = self.typing_signals.try_recv() {
            self.on_typing_signal(signal).await;
        }
    }

    async fn send_heartbeat(&self) {
        self.send_chat_command(&ClientCommand::Heartbeat).await;
    }

    async fn send_chat_command(&self, command: &ClientCommand) {
        match command.to_json() {
            Ok(frame) => {
                if let Err(e) = self.chat_feed.send(&frame).await {
                    tracing::debug!(error = %e, "Chat command not sent");
                }
            }
            Err(e) => tracing::warn!(error = %e, "Failed to encode chat command"),
        }
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("engine_id", &self.engine_id)
            .field("user_id", &self.identity.user_id)
            .finish()
    }
}

/// Cloneable handle for the presentation layer.
///
/// Reads go straight to the shared state; every mutation is an action
/// delivered into the engine loop, preserving the single-writer invariants.
#[derive(Clone)]
pub struct SyncHandle {
    actions: mpsc::Sender<LocalAction>,
    notices: broadcast::Sender<EngineNotice>,
    presence: Arc<PresenceTracker>,
    typing: Arc<TypingCoordinator>,
    call: Arc<CallMachine>,
    rooms: Arc<RwLock<RoomProjection>>,
    chat_feed: Arc<FeedAdapter>,
    call_feed: Arc<FeedAdapter>,
    commands: Arc<dyn CommandChannel>,
}

impl SyncHandle {
    /// Subscribe to engine notices
    pub fn subscribe(&self) -> broadcast::Receiver<EngineNotice> {
        self.notices.subscribe()
    }

    pub async fn set_active_room(&self, room: Option<RoomId>) -> SyncResult<()> {
        self.send(LocalAction::SetActiveRoom(room)).await
    }

    pub async fn keystroke(&self) -> SyncResult<()> {
        self.send(LocalAction::Keystroke).await
    }

    pub async fn send_message(&self, content: impl Into<String>) -> SyncResult<()> {
        self.send(LocalAction::SendMessage(content.into())).await
    }

    pub async fn set_status(&self, status: UserStatus) -> SyncResult<()> {
        self.send(LocalAction::SetStatus(status)).await
    }

    pub async fn initiate_call(
        &self,
        peer: UserId,
        peer_name: impl Into<String>,
        kind: CallKind,
    ) -> SyncResult<()> {
        self.send(LocalAction::InitiateCall {
            peer,
            peer_name: peer_name.into(),
            kind,
        })
        .await
    }

    pub async fn accept_call(&self) -> SyncResult<()> {
        self.send(LocalAction::AcceptCall).await
    }

    pub async fn reject_call(&self) -> SyncResult<()> {
        self.send(LocalAction::RejectCall).await
    }

    pub async fn end_call(&self) -> SyncResult<()> {
        self.send(LocalAction::EndCall).await
    }

    /// Stop the engine; feeds close without reconnecting
    pub async fn shutdown(&self) -> SyncResult<()> {
        self.send(LocalAction::Shutdown).await
    }

    // === Read-only state access ===

    pub fn presence(&self) -> &PresenceTracker {
        &self.presence
    }

    pub fn typing(&self) -> &TypingCoordinator {
        &self.typing
    }

    pub fn call_state(&self) -> CallState {
        self.call.snapshot()
    }

    pub fn active_room(&self) -> Option<RoomId> {
        self.rooms.read().active_room()
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.rooms.read().messages()
    }

    pub fn room_summaries(&self) -> Vec<RoomSummary> {
        self.rooms.read().summaries()
    }

    pub fn unread_total(&self) -> u32 {
        self.rooms.read().unread_total()
    }

    pub fn chat_feed_state(&self) -> FeedState {
        self.chat_feed.state()
    }

    pub fn call_feed_state(&self) -> FeedState {
        self.call_feed.state()
    }

    /// Online members of the active room, excluding the local user
    pub fn online_count(&self) -> usize {
        self.presence.online_count_in_active_room()
    }

    /// Members of the active room
    pub fn room_members(&self) -> Vec<UserPresence> {
        self.presence.room_members()
    }

    // === Attachments (base64 over the command channel) ===

    /// Upload attachment bytes; returns the stored file id
    pub async fn upload_attachment(&self, file_name: &str, bytes: &[u8]) -> SyncResult<String> {
        let encoded = crate::commands::encode_attachment(bytes);
        self.commands
            .upload_file(file_name, &encoded)
            .await
            .map_err(|e| SyncError::Command(e.to_string()))
    }

    /// Download attachment bytes by file id
    pub async fn download_attachment(&self, file_id: &str) -> SyncResult<Vec<u8>> {
        let encoded = self
            .commands
            .download_file(file_id)
            .await
            .map_err(|e| SyncError::Command(e.to_string()))?;
        crate::commands::decode_attachment(&encoded)
    }

    async fn send(&self, action: LocalAction) -> SyncResult<()> {
        self.actions
            .send(action)
            .await
            .map_err(|_| SyncError::send_failed("engine stopped"))
    }
}

impl std::fmt::Debug for SyncHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncHandle")
            .field("chat_feed", &self.chat_feed.state())
            .field("call_feed", &self.call_feed.state())
            .finish()
    }
}
