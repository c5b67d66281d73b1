//! Room membership registry
//!
//! Single source of truth for which connection belongs to which room. Both
//! directions of the mapping (connection -> participant, room -> members) live
//! behind one mutex so every mutation is atomic and every snapshot is a
//! consistent point-in-time view, no matter how many connection handlers are
//! running concurrently.

use parking_lot::Mutex;
use roomcast_core::protocol::{ConnectionId, RoomUser};
use std::collections::HashMap;

#[derive(Debug, Default)]
struct RegistryInner {
    users: HashMap<ConnectionId, RoomUser>,
    /// Member ids in join order; rooms are small so linear scans are fine
    rooms: HashMap<String, Vec<ConnectionId>>,
}

/// Connection and room membership bookkeeping
///
/// Rooms are created lazily on first join and garbage-collected when their
/// last member leaves.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    inner: Mutex<RegistryInner>,
}

impl RoomRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection in a room, returning its participant record
    ///
    /// Joining again with the same connection id replaces the existing record
    /// (rejoin support): the connection is moved out of its previous room and
    /// into the new one under the new display name.
    pub fn join(&self, connection_id: &str, room_id: &str, user_name: &str) -> RoomUser {
        let mut inner = self.inner.lock();

        if let Some(previous) = inner.users.remove(connection_id) {
            Self::remove_from_room(&mut inner, &previous.room_id, connection_id);
        }

        let user = RoomUser {
            id: connection_id.to_string(),
            user_name: user_name.to_string(),
            room_id: room_id.to_string(),
        };
        inner.users.insert(connection_id.to_string(), user.clone());
        inner
            .rooms
            .entry(room_id.to_string())
            .or_default()
            .push(connection_id.to_string());
        user
    }

    /// Remove a connection, returning its record if it was registered
    ///
    /// A no-op for connections that were never registered, so disconnect
    /// cleanup can race an explicit leave safely.
    pub fn leave(&self, connection_id: &str) -> Option<RoomUser> {
        let mut inner = self.inner.lock();
        let user = inner.users.remove(connection_id)?;
        Self::remove_from_room(&mut inner, &user.room_id, connection_id);
        Some(user)
    }

    /// Participant record for a live connection
    pub fn get(&self, connection_id: &str) -> Option<RoomUser> {
        self.inner.lock().users.get(connection_id).cloned()
    }

    /// Whether a connection id is currently registered
    pub fn contains(&self, connection_id: &str) -> bool {
        self.inner.lock().users.contains_key(connection_id)
    }

    /// Snapshot of every member of a room, in join order
    pub fn members_of(&self, room_id: &str) -> Vec<RoomUser> {
        let inner = self.inner.lock();
        inner
            .rooms
            .get(room_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| inner.users.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Snapshot of a room's members excluding one connection, in join order
    pub fn other_members(&self, room_id: &str, excluding: &str) -> Vec<RoomUser> {
        let inner = self.inner.lock();
        inner
            .rooms
            .get(room_id)
            .map(|ids| {
                ids.iter()
                    .filter(|id| id.as_str() != excluding)
                    .filter_map(|id| inner.users.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn remove_from_room(inner: &mut RegistryInner, room_id: &str, connection_id: &str) {
        if let Some(members) = inner.rooms.get_mut(room_id) {
            members.retain(|id| id != connection_id);
            if members.is_empty() {
                inner.rooms.remove(room_id);
            }
        }
    }
}
