//! Presence tracker
//!
//! Maintains the authoritative user → status map, fed by global
//! online/offline events, bulk room snapshots, and per-room status deltas.
//! Entries are never deleted, only transitioned, so "last seen" can always
//! be rendered.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashMap;

use labsync_core::{RoomId, RoomOccupant, UserId, UserPresence, UserStatus};

/// Room-scoped subset of presence, rebuilt on every room change
#[derive(Debug, Default)]
struct RoomView {
    room_id: Option<RoomId>,
    members: HashMap<UserId, UserPresence>,
}

/// Reconciles presence updates from three producers into one map.
///
/// The global map is monotonic: updates add or transition entries, never
/// remove them, and `last_activity` never regresses to an older timestamp.
pub struct PresenceTracker {
    local_user: UserId,
    global: DashMap<UserId, UserPresence>,
    room: RwLock<RoomView>,
}

impl PresenceTracker {
    /// Create a tracker for the given local user
    #[must_use]
    pub fn new(local_user: UserId) -> Self {
        Self {
            local_user,
            global: DashMap::new(),
            room: RwLock::new(RoomView::default()),
        }
    }

    /// Apply a global online/offline event.
    ///
    /// Going offline carries the previous `last_activity` forward unless a
    /// strictly fresher `last_seen` is supplied.
    pub fn apply_global_status(
        &self,
        user_id: UserId,
        user_name: &str,
        is_online: bool,
        last_seen: Option<DateTime<Utc>>,
    ) {
        match self.global.entry(user_id) {
            Entry::Occupied(mut entry) => {
                let presence = entry.get_mut();
                presence.user_name = user_name.to_string();
                if is_online {
                    presence.transition(UserStatus::Online);
                } else {
                    presence.mark_offline(last_seen);
                }
            }
            Entry::Vacant(entry) => {
                let mut presence = UserPresence::new(
                    user_id,
                    user_name,
                    if is_online { UserStatus::Online } else { UserStatus::Offline },
                );
                if !is_online {
                    if let Some(seen) = last_seen {
                        presence.last_activity = seen;
                    }
                }
                entry.insert(presence);
            }
        }

        tracing::trace!(
            user_id = %user_id,
            online = is_online,
            "Global status applied"
        );
    }

    /// Apply a bulk "who is online in this room" snapshot.
    ///
    /// Replaces the room-scoped view wholesale when the snapshot targets the
    /// active room, and merges every entry into the global map. The global
    /// map only gains or updates entries; users absent from one room's
    /// snapshot are left untouched.
    pub fn apply_room_snapshot(&self, room_id: RoomId, users: &[RoomOccupant]) {
        for user in users {
            match self.global.entry(user.user_id) {
                Entry::Occupied(mut entry) => {
                    let presence = entry.get_mut();
                    presence.user_name = user.user_name.clone();
                    presence.transition(user.status);
                }
                Entry::Vacant(entry) => {
                    entry.insert(UserPresence::new(user.user_id, &user.user_name, user.status));
                }
            }
        }

        let mut room = self.room.write();
        if room.room_id == Some(room_id) {
            room.members = users
                .iter()
                .map(|u| {
                    (
                        u.user_id,
                        UserPresence::new(u.user_id, &u.user_name, u.status),
                    )
                })
                .collect();
        }

        tracing::debug!(
            room_id = %room_id,
            count = users.len(),
            "Room snapshot applied"
        );
    }

    /// Apply a per-room status delta for one user.
    ///
    /// The global map is always updated; the room view only when `room_id`
    /// matches the active room (insert if absent, patch in place otherwise).
    pub fn apply_room_status_delta(
        &self,
        room_id: RoomId,
        user_id: UserId,
        user_name: &str,
        status: UserStatus,
    ) {
        match self.global.entry(user_id) {
            Entry::Occupied(mut entry) => {
                let presence = entry.get_mut();
                presence.user_name = user_name.to_string();
                presence.transition(status);
            }
            Entry::Vacant(entry) => {
                entry.insert(UserPresence::new(user_id, user_name, status));
            }
        }

        let mut room = self.room.write();
        if room.room_id == Some(room_id) {
            room.members
                .entry(user_id)
                .and_modify(|p| {
                    p.user_name = user_name.to_string();
                    p.transition(status);
                })
                .or_insert_with(|| UserPresence::new(user_id, user_name, status));
        }

        tracing::trace!(
            room_id = %room_id,
            user_id = %user_id,
            status = %status,
            "Room status delta applied"
        );
    }

    /// Switch the active room.
    ///
    /// The room view is cleared, not guessed: presence for the new room must
    /// be explicitly re-requested from the backend.
    pub fn set_active_room(&self, room_id: Option<RoomId>) {
        let mut room = self.room.write();
        room.room_id = room_id;
        room.members.clear();
    }

    /// The currently active room
    pub fn active_room(&self) -> Option<RoomId> {
        self.room.read().room_id
    }

    /// Look up a user's presence
    pub fn presence(&self, user_id: UserId) -> Option<UserPresence> {
        self.global.get(&user_id).map(|p| p.clone())
    }

    /// Whether a user counts as online (status online or typing)
    pub fn is_online(&self, user_id: UserId) -> bool {
        self.global
            .get(&user_id)
            .is_some_and(|p| p.status.counts_as_online())
    }

    /// Online members of the active room, excluding the local user
    pub fn online_count_in_active_room(&self) -> usize {
        self.room
            .read()
            .members
            .values()
            .filter(|p| p.user_id != self.local_user && p.is_online())
            .count()
    }

    /// Snapshot of the active room's members
    pub fn room_members(&self) -> Vec<UserPresence> {
        self.room.read().members.values().cloned().collect()
    }

    /// Number of users ever seen
    pub fn known_user_count(&self) -> usize {
        self.global.len()
    }
}

impl std::fmt::Debug for PresenceTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresenceTracker")
            .field("known_users", &self.global.len())
            .field("active_room", &self.active_room())
            .finish()
    }
}
