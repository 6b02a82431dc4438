//! Call session entities
//!
//! The single active call and the transient holder for a not-yet-answered
//! incoming offer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::ids::UserId;

/// Kind of call media
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallKind {
    Audio,
    Video,
}

impl fmt::Display for CallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Audio => write!(f, "audio"),
            Self::Video => write!(f, "video"),
        }
    }
}

/// Which side initiated the call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallDirection {
    Incoming,
    Outgoing,
}

/// Transient holder for an offer not yet accepted or rejected
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingOffer {
    pub from: UserId,
    pub from_name: String,
    pub kind: CallKind,
    /// Opaque signaling payload, forwarded untouched to the media layer
    pub payload: Value,
    pub received_at: DateTime<Utc>,
}

impl IncomingOffer {
    pub fn new(from: UserId, from_name: impl Into<String>, kind: CallKind, payload: Value) -> Self {
        Self {
            from,
            from_name: from_name.into(),
            kind,
            payload,
            received_at: Utc::now(),
        }
    }
}

/// The single active call session
#[derive(Debug, Clone, PartialEq)]
pub struct CallSession {
    pub kind: CallKind,
    pub peer_id: UserId,
    pub peer_name: String,
    pub direction: CallDirection,
    /// Opaque offer payload the session was negotiated from
    pub offer_payload: Value,
    pub started_at: DateTime<Utc>,
}

impl CallSession {
    /// Build a session from an accepted incoming offer
    #[must_use]
    pub fn from_offer(offer: IncomingOffer) -> Self {
        Self {
            kind: offer.kind,
            peer_id: offer.from,
            peer_name: offer.from_name,
            direction: CallDirection::Incoming,
            offer_payload: offer.payload,
            started_at: Utc::now(),
        }
    }

    /// Build an outgoing session toward a peer
    pub fn outgoing(peer_id: UserId, peer_name: impl Into<String>, kind: CallKind) -> Self {
        Self {
            kind,
            peer_id,
            peer_name: peer_name.into(),
            direction: CallDirection::Outgoing,
            offer_payload: Value::Null,
            started_at: Utc::now(),
        }
    }
}
