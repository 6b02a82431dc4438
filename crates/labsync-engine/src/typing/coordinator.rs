//! Typing coordinator
//!
//! Local side: an Idle/Typing state machine with a cancellable idle timer.
//! Only genuine Idle→Typing edges emit a start signal; further keystrokes
//! re-arm the timer silently. Remote side: at most one typing entry per user
//! system-wide, driven entirely by inbound start/stop signals.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use labsync_core::{RoomId, TypingEntry, UserId};

/// Outbound typing signals, forwarded to the transport by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypingSignal {
    Start { room_id: RoomId },
    Stop { room_id: RoomId },
}

/// Local typing state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LocalState {
    Idle,
    Typing { room_id: RoomId },
}

#[derive(Debug)]
struct LocalTyping {
    state: LocalState,
    /// Bumped on every transition; stale timers check it before firing
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

/// Coordinates local and remote typing state for one user session
pub struct TypingCoordinator {
    local_user: UserId,
    idle_timeout: Duration,
    local: Arc<Mutex<LocalTyping>>,
    remote: DashMap<UserId, TypingEntry>,
    signals: mpsc::UnboundedSender<TypingSignal>,
}

impl TypingCoordinator {
    /// Create a coordinator; emitted signals arrive on the returned receiver
    pub fn new(
        local_user: UserId,
        idle_timeout: Duration,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<TypingSignal>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let coordinator = Arc::new(Self {
            local_user,
            idle_timeout,
            local: Arc::new(Mutex::new(LocalTyping {
                state: LocalState::Idle,
                generation: 0,
                timer: None,
            })),
            remote: DashMap::new(),
            signals: tx,
        });
        (coordinator, rx)
    }

    /// Record a local keystroke in the given room.
    ///
    /// The first keystroke emits a start signal and arms the idle timer; any
    /// further keystroke only re-arms the timer.
    pub fn keystroke(&self, room_id: RoomId) {
        let mut local = self.local.lock();
        match local.state {
            LocalState::Idle => {
                local.state = LocalState::Typing { room_id };
                self.emit(TypingSignal::Start { room_id });
                self.arm_timer(&mut local, room_id);
            }
            LocalState::Typing { room_id: current } if current == room_id => {
                self.arm_timer(&mut local, room_id);
            }
            LocalState::Typing { room_id: previous } => {
                // Keystroke in a different room than the one we were typing
                // in; close out the old room first.
                self.emit(TypingSignal::Stop { room_id: previous });
                local.state = LocalState::Typing { room_id };
                self.emit(TypingSignal::Start { room_id });
                self.arm_timer(&mut local, room_id);
            }
        }
    }

    /// The local user sent a message: stop typing immediately, bypassing the timer
    pub fn message_sent(&self) {
        let mut local = self.local.lock();
        if let LocalState::Typing { room_id } = local.state {
            self.emit(TypingSignal::Stop { room_id });
            Self::reset(&mut local);
        }
    }

    /// Switch the active room.
    ///
    /// If the local user was mid-typing in the previous room, exactly one
    /// stop signal is sent before that state is discarded. Remote entries
    /// for other rooms are pruned.
    pub fn set_active_room(&self, room_id: Option<RoomId>) {
        {
            let mut local = self.local.lock();
            if let LocalState::Typing { room_id: previous } = local.state {
                if Some(previous) != room_id {
                    self.emit(TypingSignal::Stop { room_id: previous });
                    Self::reset(&mut local);
                }
            }
        }

        match room_id {
            Some(room) => self.remote.retain(|_, entry| entry.room_id == room),
            None => self.remote.clear(),
        }
    }

    /// Apply an inbound remote typing signal.
    ///
    /// A user has at most one entry system-wide; a start signal for a new
    /// room replaces any previous entry (latest room wins). Entries expire
    /// only via an explicit stop from the peer.
    pub fn apply_remote(&self, room_id: RoomId, user_id: UserId, user_name: &str, is_typing: bool) {
        if user_id == self.local_user {
            return;
        }

        if is_typing {
            self.remote.insert(
                user_id,
                TypingEntry {
                    user_id,
                    user_name: user_name.to_string(),
                    room_id,
                },
            );
        } else {
            self.remote.remove(&user_id);
        }

        tracing::trace!(
            room_id = %room_id,
            user_id = %user_id,
            typing = is_typing,
            "Remote typing applied"
        );
    }

    /// Remote users currently typing in the given room
    pub fn typing_users(&self, room_id: RoomId) -> Vec<TypingEntry> {
        self.remote
            .iter()
            .filter(|e| e.room_id == room_id)
            .map(|e| e.clone())
            .collect()
    }

    /// Whether a remote user is flagged as typing anywhere
    pub fn is_typing(&self, user_id: UserId) -> bool {
        self.remote.contains_key(&user_id)
    }

    /// Cancel the idle timer and discard local state without emitting.
    ///
    /// For component teardown; signals for a room that has disappeared must
    /// not be emitted.
    pub fn shutdown(&self) {
        let mut local = self.local.lock();
        Self::reset(&mut local);
    }

    fn emit(&self, signal: TypingSignal) {
        // Best-effort: a dropped receiver means the engine is gone
        let _ = self.signals.send(signal);
    }

    /// Cancel any running timer and return to Idle
    fn reset(local: &mut LocalTyping) {
        local.generation += 1;
        local.state = LocalState::Idle;
        if let Some(timer) = local.timer.take() {
            timer.abort();
        }
    }

    /// Arm (or re-arm) the idle timer for the current typing burst
    fn arm_timer(&self, local: &mut LocalTyping, room_id: RoomId) {
        local.generation += 1;
        let generation = local.generation;
        if let Some(old) = local.timer.take() {
            old.abort();
        }

        let state = Arc::clone(&self.local);
        let signals = self.signals.clone();
        let idle = self.idle_timeout;
        local.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(idle).await;
            let mut local = state.lock();
            if local.generation == generation {
                if let LocalState::Typing { room_id: current } = local.state {
                    debug_assert_eq!(current, room_id);
                    let _ = signals.send(TypingSignal::Stop { room_id: current });
                    local.generation += 1;
                    local.state = LocalState::Idle;
                    local.timer = None;
                }
            }
        }));
    }
}

impl Drop for TypingCoordinator {
    fn drop(&mut self) {
        let mut local = self.local.lock();
        Self::reset(&mut local);
    }
}

impl std::fmt::Debug for TypingCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypingCoordinator")
            .field("local_user", &self.local_user)
            .field("remote_typing", &self.remote.len())
            .finish()
    }
}
