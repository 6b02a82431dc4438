//! Call state machine
//!
//! Models the lifecycle Idle → Incoming → Active → Idle. Transitions return
//! effects (signals to send, notices to raise) that the engine performs; the
//! machine itself never touches the network, which keeps the state reset on
//! teardown unconditional even when a send fails.

use parking_lot::Mutex;

use labsync_core::{CallKind, CallSession, CallSignal, IncomingOffer, UserId};

/// The call lifecycle state. At most one non-Idle state system-wide.
#[derive(Debug, Clone, PartialEq)]
pub enum CallState {
    Idle,
    Incoming(IncomingOffer),
    Active(CallSession),
}

impl CallState {
    /// Whether a call is in progress or pending
    #[must_use]
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

/// Why a session or pending offer went away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallEndReason {
    /// The local user hung up
    HungUp,
    /// The peer answered busy
    PeerBusy,
    /// The peer declined the offer
    PeerRejected,
    /// The peer hung up
    PeerEnded,
}

/// Side effects of a transition, performed by the engine
#[derive(Debug, Clone, PartialEq)]
pub enum CallEffect {
    /// Send a signal over the call feed
    Send(CallSignal),
    /// Surface an incoming call to the presentation layer
    RingIncoming {
        from: UserId,
        from_name: String,
        kind: CallKind,
    },
    /// Surface that the call or pending offer ended
    SessionEnded { reason: CallEndReason },
}

/// The call-signaling state machine for one local user
pub struct CallMachine {
    local_user: UserId,
    local_name: String,
    state: Mutex<CallState>,
}

impl CallMachine {
    pub fn new(local_user: UserId, local_name: impl Into<String>) -> Self {
        Self {
            local_user,
            local_name: local_name.into(),
            state: Mutex::new(CallState::Idle),
        }
    }

    /// Snapshot of the current state
    pub fn snapshot(&self) -> CallState {
        self.state.lock().clone()
    }

    /// Apply an inbound signal from the call feed
    pub fn on_signal(&self, signal: CallSignal) -> Vec<CallEffect> {
        let mut state = self.state.lock();
        match signal {
            CallSignal::Offer {
                from,
                from_name,
                call_kind,
                payload,
                ..
            } => match &*state {
                CallState::Idle => {
                    let offer = IncomingOffer::new(from, from_name.clone(), call_kind, payload);
                    *state = CallState::Incoming(offer);
                    tracing::info!(from = %from, kind = %call_kind, "Incoming call offer");
                    vec![CallEffect::RingIncoming {
                        from,
                        from_name,
                        kind: call_kind,
                    }]
                }
                // Busy in both collision directions: a second offer while one
                // is pending, and an offer while a call is active.
                CallState::Incoming(_) | CallState::Active(_) => {
                    tracing::info!(from = %from, "Offer while busy, answering busy");
                    vec![CallEffect::Send(CallSignal::Busy {
                        from: self.local_user,
                        to: from,
                    })]
                }
            },
            CallSignal::Busy { from, .. } => self.collapse_from_peer(&mut state, from, CallEndReason::PeerBusy),
            CallSignal::Rejected { from, .. } => {
                self.collapse_from_peer(&mut state, from, CallEndReason::PeerRejected)
            }
            CallSignal::Ended { from, .. } => {
                self.collapse_from_peer(&mut state, from, CallEndReason::PeerEnded)
            }
        }
    }

    /// Accept the pending incoming offer
    pub fn accept(&self) -> Vec<CallEffect> {
        let mut state = self.state.lock();
        match std::mem::replace(&mut *state, CallState::Idle) {
            CallState::Incoming(offer) => {
                let session = CallSession::from_offer(offer);
                tracing::info!(peer = %session.peer_id, "Call accepted");
                *state = CallState::Active(session);
                vec![]
            }
            other => {
                tracing::warn!("Accept with no pending offer");
                *state = other;
                vec![]
            }
        }
    }

    /// Reject the pending incoming offer
    pub fn reject(&self) -> Vec<CallEffect> {
        let mut state = self.state.lock();
        match std::mem::replace(&mut *state, CallState::Idle) {
            CallState::Incoming(offer) => {
                tracing::info!(peer = %offer.from, "Call rejected");
                vec![CallEffect::Send(CallSignal::Rejected {
                    from: self.local_user,
                    to: offer.from,
                })]
            }
            other => {
                *state = other;
                vec![]
            }
        }
    }

    /// Start an outgoing call. The engine probes availability first; this is
    /// only invoked once the peer is known to be reachable.
    ///
    /// Initiating while an offer is pending auto-rejects that offer.
    pub fn begin_outgoing(
        &self,
        peer: UserId,
        peer_name: impl Into<String>,
        kind: CallKind,
    ) -> Vec<CallEffect> {
        let mut state = self.state.lock();
        let mut effects = Vec::new();

        match std::mem::replace(&mut *state, CallState::Idle) {
            CallState::Active(session) => {
                tracing::warn!(peer = %session.peer_id, "Initiate while a call is active");
                *state = CallState::Active(session);
                return effects;
            }
            CallState::Incoming(offer) => {
                effects.push(CallEffect::Send(CallSignal::Rejected {
                    from: self.local_user,
                    to: offer.from,
                }));
            }
            CallState::Idle => {}
        }

        let peer_name = peer_name.into();
        let session = CallSession::outgoing(peer, peer_name.clone(), kind);
        tracing::info!(peer = %peer, kind = %kind, "Outgoing call started");
        *state = CallState::Active(session);

        effects.push(CallEffect::Send(CallSignal::Offer {
            from: self.local_user,
            from_name: self.local_name.clone(),
            to: peer,
            call_kind: kind,
            payload: serde_json::Value::Null,
        }));
        effects
    }

    /// End the active call.
    ///
    /// The reset to Idle happens here, before any send is attempted, so a
    /// network failure during teardown cannot leave a zombie session.
    pub fn end(&self) -> Vec<CallEffect> {
        let mut state = self.state.lock();
        match std::mem::replace(&mut *state, CallState::Idle) {
            CallState::Active(session) => {
                tracing::info!(peer = %session.peer_id, "Call ended locally");
                vec![
                    CallEffect::Send(CallSignal::Ended {
                        from: self.local_user,
                        to: session.peer_id,
                    }),
                    CallEffect::SessionEnded {
                        reason: CallEndReason::HungUp,
                    },
                ]
            }
            CallState::Incoming(offer) => {
                // Ending with only a pending offer behaves like a reject
                vec![CallEffect::Send(CallSignal::Rejected {
                    from: self.local_user,
                    to: offer.from,
                })]
            }
            CallState::Idle => vec![],
        }
    }

    /// Collapse to Idle when the peer of the current state signals busy,
    /// rejected, or ended. Signals from unrelated users are ignored.
    fn collapse_from_peer(
        &self,
        state: &mut CallState,
        from: UserId,
        reason: CallEndReason,
    ) -> Vec<CallEffect> {
        let peer = match &*state {
            CallState::Active(session) => Some(session.peer_id),
            CallState::Incoming(offer) => Some(offer.from),
            CallState::Idle => None,
        };

        if peer == Some(from) {
            *state = CallState::Idle;
            tracing::info!(from = %from, reason = ?reason, "Call collapsed to idle");
            vec![CallEffect::SessionEnded { reason }]
        } else {
            tracing::debug!(from = %from, "Ignoring signal from unrelated user");
            vec![]
        }
    }
}

impl std::fmt::Debug for CallMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallMachine")
            .field("local_user", &self.local_user)
            .field("state", &self.snapshot())
            .finish()
    }
}
