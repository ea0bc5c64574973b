//! Room Registry
//!
//! In-process authoritative state: the configured lobby set and every managed
//! room with its occupancy. The registry is owned by the lifecycle controller
//! and only mutated through `&mut self`, so two operations on the same channel
//! can never interleave.

use crate::model::{ChannelId, EphemeralRoom, LifecycleState, UserId};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Default)]
pub struct RoomRegistry {
    lobbies: HashSet<ChannelId>,
    rooms: HashMap<ChannelId, EphemeralRoom>,
}

impl RoomRegistry {
    pub fn new(lobbies: impl IntoIterator<Item = ChannelId>) -> Self {
        Self {
            lobbies: lobbies.into_iter().collect(),
            rooms: HashMap::new(),
        }
    }

    pub fn is_lobby(&self, channel: ChannelId) -> bool {
        self.lobbies.contains(&channel)
    }

    pub fn is_managed(&self, channel: ChannelId) -> bool {
        self.rooms.contains_key(&channel)
    }

    pub fn get(&self, channel: ChannelId) -> Option<&EphemeralRoom> {
        self.rooms.get(&channel)
    }

    /// Insert or replace a room. Lobby IDs are refused and `false` is returned.
    pub fn upsert(&mut self, room: EphemeralRoom) -> bool {
        if self.is_lobby(room.id) {
            tracing::warn!("Refusing to track lobby {} as an ephemeral room", room.id);
            return false;
        }
        self.rooms.insert(room.id, room);
        true
    }

    /// Finish creation: the room is recorded and counts as `Active`.
    pub fn mark_active(&mut self, channel: ChannelId) {
        if let Some(room) = self.rooms.get_mut(&channel) {
            if room.state == LifecycleState::Creating {
                room.state = LifecycleState::Active;
            }
        }
    }

    /// Set the live occupancy of a recovered room, inserting it if needed.
    ///
    /// An existing record keeps its owner and placement.
    pub fn restore(&mut self, channel: ChannelId, occupancy: u32) -> bool {
        match self.rooms.get_mut(&channel) {
            Some(room) => {
                room.occupancy = occupancy;
                room.state = if occupancy == 0 {
                    LifecycleState::Empty
                } else {
                    LifecycleState::Active
                };
                true
            }
            None => self.upsert(EphemeralRoom::restored(channel, occupancy)),
        }
    }

    /// Returns the new count, or `None` if `channel` is not tracked.
    pub fn increment_occupancy(&mut self, channel: ChannelId) -> Option<u32> {
        let room = self.rooms.get_mut(&channel)?;
        if room.state == LifecycleState::Deleting {
            return Some(room.occupancy);
        }
        room.occupancy = room.occupancy.saturating_add(1);
        room.state = LifecycleState::Active;
        Some(room.occupancy)
    }

    /// Returns the new count, or `None` if `channel` is not tracked.
    ///
    /// The count clamps at zero; reaching zero marks the room `Empty`.
    pub fn decrement_occupancy(&mut self, channel: ChannelId) -> Option<u32> {
        let room = self.rooms.get_mut(&channel)?;
        room.occupancy = room.occupancy.saturating_sub(1);
        if room.occupancy == 0 && room.state == LifecycleState::Active {
            room.state = LifecycleState::Empty;
        }
        Some(room.occupancy)
    }

    /// Consume the pending arrival of `user` if it is the one still due.
    pub fn take_pending_arrival(&mut self, channel: ChannelId, user: UserId) -> bool {
        match self.rooms.get_mut(&channel) {
            Some(room) if room.pending_arrival == Some(user) => {
                room.pending_arrival = None;
                true
            }
            _ => false,
        }
    }

    /// Move an `Empty` room to `Deleting`. Returns `true` only for the first caller.
    pub fn begin_deletion(&mut self, channel: ChannelId) -> bool {
        match self.rooms.get_mut(&channel) {
            Some(room) if room.state == LifecycleState::Empty => {
                room.state = LifecycleState::Deleting;
                true
            }
            _ => false,
        }
    }

    /// Drop a room; the returned record is marked `Gone`.
    pub fn remove(&mut self, channel: ChannelId) -> Option<EphemeralRoom> {
        self.rooms.remove(&channel).map(|mut room| {
            room.state = LifecycleState::Gone;
            room
        })
    }

    pub fn lobbies(&self) -> impl Iterator<Item = ChannelId> + '_ {
        self.lobbies.iter().copied()
    }

    pub fn rooms(&self) -> impl Iterator<Item = &EphemeralRoom> {
        self.rooms.values()
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}
