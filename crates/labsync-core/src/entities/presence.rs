//! Presence entities
//!
//! A user's status plus last-activity timestamp, and the typing marker.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::{RoomId, UserId};

/// User presence status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Online,
    #[default]
    Offline,
    Away,
    Typing,
}

impl UserStatus {
    /// Whether this status counts as "online" for derived queries.
    ///
    /// A typing user is necessarily connected, so `Typing` counts.
    #[must_use]
    pub fn counts_as_online(self) -> bool {
        matches!(self, Self::Online | Self::Typing)
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Online => "online",
            Self::Offline => "offline",
            Self::Away => "away",
            Self::Typing => "typing",
        };
        write!(f, "{s}")
    }
}

/// A user's presence record
///
/// Records are append-once-then-update: once a user has been seen, the entry
/// is only ever transitioned (e.g. to offline), never removed, so "last seen"
/// can always be rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPresence {
    pub user_id: UserId,
    pub user_name: String,
    pub status: UserStatus,
    pub last_activity: DateTime<Utc>,
}

impl UserPresence {
    /// Create a new presence record with the given status, stamped now
    pub fn new(user_id: UserId, user_name: impl Into<String>, status: UserStatus) -> Self {
        Self {
            user_id,
            user_name: user_name.into(),
            status,
            last_activity: Utc::now(),
        }
    }

    /// Whether the user currently counts as online
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.status.counts_as_online()
    }

    /// Apply a new status, refreshing the activity timestamp
    pub fn transition(&mut self, status: UserStatus) {
        self.status = status;
        self.last_activity = Utc::now();
    }

    /// Transition to offline, carrying the activity timestamp forward.
    ///
    /// The timestamp only moves forward: a stale `last_seen` from a delayed
    /// event never regresses an already-fresher record.
    pub fn mark_offline(&mut self, last_seen: Option<DateTime<Utc>>) {
        self.status = UserStatus::Offline;
        if let Some(seen) = last_seen {
            if seen > self.last_activity {
                self.last_activity = seen;
            }
        }
    }
}

/// Marker for a remote user currently typing
///
/// A user has at most one entry system-wide; the latest room wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingEntry {
    pub user_id: UserId,
    pub user_name: String,
    pub room_id: RoomId,
}
