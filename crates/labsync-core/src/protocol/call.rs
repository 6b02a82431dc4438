//! Call-signaling feed protocol
//!
//! The call feed is a separate socket from the chat feed; payloads are JSON
//! objects tagged by `type` over the offer/busy/rejected/ended vocabulary.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entities::CallKind;
use crate::ids::UserId;

/// Signaling messages exchanged over the call feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CallSignal {
    /// A peer is offering a call
    #[serde(rename = "call-offer")]
    Offer {
        from: UserId,
        from_name: String,
        to: UserId,
        call_kind: CallKind,
        /// Opaque negotiation payload, forwarded to the media layer untouched
        #[serde(default)]
        payload: Value,
    },

    /// The callee is already in a call
    #[serde(rename = "call-busy")]
    Busy { from: UserId, to: UserId },

    /// The callee declined the offer
    #[serde(rename = "call-rejected")]
    Rejected { from: UserId, to: UserId },

    /// Either side hung up
    #[serde(rename = "call-ended")]
    Ended { from: UserId, to: UserId },
}

impl CallSignal {
    /// Serialize to a JSON frame
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from a JSON frame
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// The user this signal originates from
    #[must_use]
    pub fn sender(&self) -> UserId {
        match self {
            Self::Offer { from, .. }
            | Self::Busy { from, .. }
            | Self::Rejected { from, .. }
            | Self::Ended { from, .. } => *from,
        }
    }
}
