//! Room registry: maps room ids to the sessions joined to them.
//!
//! Plain data structure with no locking of its own; the relay engine owns it
//! behind a single lock. A room id present in the registry always has at
//! least one member.

use std::collections::HashMap;

use spectra_common::{DeviceType, MemberView, RoomSnapshot, SessionId};

/// A session's state inside one room.
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub device_type: DeviceType,
    pub frequencies: Vec<f64>,
    /// Milliseconds since the Unix epoch; never decreases for a member.
    pub last_updated: i64,
}

#[derive(Debug, Default)]
pub struct Room {
    members: HashMap<SessionId, Member>,
}

impl Room {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn get(&self, session_id: &SessionId) -> Option<&Member> {
        self.members.get(session_id)
    }

    pub fn session_ids(&self) -> impl Iterator<Item = &SessionId> {
        self.members.keys()
    }
}

/// Result of [`RoomRegistry::remove_member`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// The session was not in the room (or the room does not exist).
    NotMember,
    /// Removed; other members remain.
    Removed,
    /// Removed the last member; the room is gone.
    RoomClosed,
}

#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<String, Room>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Existing room, or a new empty one.
    ///
    /// A room created here must receive a member before the current event
    /// ends; [`prune`](Self::prune) drops any that did not.
    pub fn ensure_room(&mut self, room_id: &str) -> &mut Room {
        self.rooms.entry(room_id.to_string()).or_default()
    }

    /// Insert or overwrite a session's entry, creating the room if absent.
    pub fn upsert_member(
        &mut self,
        room_id: &str,
        session_id: &SessionId,
        device_type: DeviceType,
        frequencies: Vec<f64>,
        timestamp: i64,
    ) {
        self.ensure_room(room_id).members.insert(
            session_id.clone(),
            Member {
                device_type,
                frequencies,
                last_updated: timestamp,
            },
        );
    }

    /// Store a fresh audio snapshot for an existing member.
    ///
    /// Frequencies are last-write-wins; the stored timestamp only moves
    /// forward. The device type is left as set on join. Returns `None` when
    /// the session is not a member of the room.
    pub fn refresh_member(
        &mut self,
        room_id: &str,
        session_id: &SessionId,
        frequencies: Vec<f64>,
        timestamp: i64,
    ) -> Option<&Member> {
        let member = self.rooms.get_mut(room_id)?.members.get_mut(session_id)?;
        member.frequencies = frequencies;
        member.last_updated = member.last_updated.max(timestamp);
        Some(member)
    }

    /// Remove a session from a room, deleting the room once it is empty.
    pub fn remove_member(&mut self, room_id: &str, session_id: &SessionId) -> Removal {
        let Some(room) = self.rooms.get_mut(room_id) else {
            return Removal::NotMember;
        };
        if room.members.remove(session_id).is_none() {
            return Removal::NotMember;
        }
        if room.is_empty() {
            self.rooms.remove(room_id);
            Removal::RoomClosed
        } else {
            Removal::Removed
        }
    }

    /// Drop rooms left empty by [`ensure_room`](Self::ensure_room).
    pub fn prune(&mut self) {
        self.rooms.retain(|id, room| {
            if room.is_empty() {
                tracing::debug!(room = %id, "Pruning empty room");
            }
            !room.is_empty()
        });
    }

    /// Full member set of a room, or `None` if the room does not exist.
    pub fn snapshot(&self, room_id: &str) -> Option<RoomSnapshot> {
        let room = self.rooms.get(room_id)?;
        Some(
            room.members
                .iter()
                .map(|(id, member)| {
                    (
                        id.clone(),
                        MemberView {
                            id: id.clone(),
                            device_type: member.device_type,
                            frequencies: member.frequencies.clone(),
                            timestamp: member.last_updated,
                        },
                    )
                })
                .collect(),
        )
    }

    pub fn room(&self, room_id: &str) -> Option<&Room> {
        self.rooms.get(room_id)
    }

    pub fn contains_room(&self, room_id: &str) -> bool {
        self.rooms.contains_key(room_id)
    }

    pub fn is_member(&self, room_id: &str, session_id: &SessionId) -> bool {
        self.rooms
            .get(room_id)
            .is_some_and(|room| room.members.contains_key(session_id))
    }

    /// Number of rooms with at least one member.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn member_count(&self, room_id: &str) -> usize {
        self.rooms.get(room_id).map_or(0, Room::len)
    }

    /// Ids of every room the session belongs to, sorted.
    pub fn rooms_of(&self, session_id: &SessionId) -> Vec<String> {
        let mut ids: Vec<String> = self
            .rooms
            .iter()
            .filter(|(_, room)| room.members.contains_key(session_id))
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }
}
