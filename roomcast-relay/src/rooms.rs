//! Room registry for the relay server.
//!
//! Maintains the authoritative mapping from room identifier to the set of
//! sessions currently joined there, plus the reverse session-to-room map.
//! Both maps mutate under a single lock, so the symmetry invariant — a
//! session is in a room's member set exactly when that room is the session's
//! recorded room — can never be observed broken.
//!
//! The registry knows nothing about transports. All operations are total:
//! unknown rooms or sessions degrade to no-ops or empty results.

use std::collections::{HashMap, HashSet};

use roomcast_proto::room::RoomId;
use roomcast_proto::session::SessionId;
use tokio::sync::RwLock;

/// Forward and reverse membership maps, always mutated together.
#[derive(Debug, Default)]
struct Membership {
    /// Room to member set. Entries exist only while non-empty.
    rooms: HashMap<RoomId, HashSet<SessionId>>,
    /// Session to its currently joined room.
    sessions: HashMap<SessionId, RoomId>,
}

impl Membership {
    /// Removes `session_id` from whatever room it occupies, dropping the
    /// room entry if it empties.
    fn remove(&mut self, session_id: SessionId) -> Option<RoomId> {
        let room = self.sessions.remove(&session_id)?;
        if let Some(members) = self.rooms.get_mut(&room) {
            members.remove(&session_id);
            if members.is_empty() {
                self.rooms.remove(&room);
            }
        }
        Some(room)
    }
}

/// Authoritative room membership registry.
///
/// Thread-safe via [`RwLock`]. Rooms materialize lazily on first join and
/// are dropped when their last member leaves, so the registry never retains
/// handles to dead sessions.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    inner: RwLock<Membership>,
}

impl RoomRegistry {
    /// Creates a new, empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `session_id` to the member set of `room_id`.
    ///
    /// A session occupies at most one room at a time: if it was a member of
    /// a different room, it is moved atomically. Re-joining the current room
    /// is a no-op. Returns the previously occupied room, if any.
    pub async fn join(&self, room_id: &RoomId, session_id: SessionId) -> Option<RoomId> {
        let mut inner = self.inner.write().await;

        if inner.sessions.get(&session_id) == Some(room_id) {
            return Some(room_id.clone());
        }

        let previous = inner.remove(session_id);
        inner
            .rooms
            .entry(room_id.clone())
            .or_default()
            .insert(session_id);
        inner.sessions.insert(session_id, room_id.clone());
        drop(inner);

        previous
    }

    /// Removes `session_id` from whatever room it currently occupies.
    ///
    /// No-op if the session is not a member of any room; safe to call any
    /// number of times. Returns the room that was left, if any.
    pub async fn leave(&self, session_id: SessionId) -> Option<RoomId> {
        let mut inner = self.inner.write().await;
        inner.remove(session_id)
    }

    /// Returns a snapshot of the session identifiers currently in `room_id`.
    ///
    /// Unknown or empty rooms yield an empty vector, never an error. The
    /// snapshot is an owned copy; later membership changes do not affect it.
    pub async fn members_of(&self, room_id: &RoomId) -> Vec<SessionId> {
        let inner = self.inner.read().await;
        inner
            .rooms
            .get(room_id)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Returns the room `session_id` currently occupies, if any.
    pub async fn room_of(&self, session_id: SessionId) -> Option<RoomId> {
        let inner = self.inner.read().await;
        inner.sessions.get(&session_id).cloned()
    }

    /// Returns the number of rooms with at least one member.
    pub async fn room_count(&self) -> usize {
        let inner = self.inner.read().await;
        inner.rooms.len()
    }
}
