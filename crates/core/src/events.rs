//! Normalized events consumed by the room service.

use crate::model::{ChannelId, GuildId, UserId};
use std::collections::HashMap;

/// A user's voice channel changed.
///
/// `previous` is `None` when the user just connected; `current` is `None` when
/// they disconnected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceStateChange {
    pub guild_id: GuildId,
    pub user_id: UserId,
    pub previous: Option<ChannelId>,
    pub current: Option<ChannelId>,
}

impl VoiceStateChange {
    pub fn joined(guild_id: GuildId, user_id: UserId, channel: ChannelId) -> Self {
        Self {
            guild_id,
            user_id,
            previous: None,
            current: Some(channel),
        }
    }

    pub fn left(guild_id: GuildId, user_id: UserId, channel: ChannelId) -> Self {
        Self {
            guild_id,
            user_id,
            previous: Some(channel),
            current: None,
        }
    }

    pub fn moved(guild_id: GuildId, user_id: UserId, from: ChannelId, to: ChannelId) -> Self {
        Self {
            guild_id,
            user_id,
            previous: Some(from),
            current: Some(to),
        }
    }

    /// Channel the user left, if this change is a real departure
    pub fn departed(&self) -> Option<ChannelId> {
        self.previous.filter(|prev| Some(*prev) != self.current)
    }

    /// Channel the user entered, if this change is a real arrival
    pub fn arrived(&self) -> Option<ChannelId> {
        self.current.filter(|cur| Some(*cur) != self.previous)
    }
}

/// One user sitting in one voice channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoicePresence {
    pub user_id: UserId,
    pub channel_id: ChannelId,
}

/// Voice presences of one guild as delivered when the connection came up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuildSnapshot {
    pub guild_id: GuildId,
    pub voice_states: Vec<VoicePresence>,
}

/// Live voice roster across every guild
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresenceSnapshot {
    pub guilds: Vec<GuildSnapshot>,
}

impl PresenceSnapshot {
    /// Occupant count per channel across all guilds.
    pub fn occupancy(&self) -> HashMap<ChannelId, u32> {
        let mut counts = HashMap::new();
        for presence in self.guilds.iter().flat_map(|g| &g.voice_states) {
            *counts.entry(presence.channel_id).or_insert(0) += 1;
        }
        counts
    }

    /// Every `(guild, user)` pair currently sitting in `channel`.
    pub fn occupants_of(&self, channel: ChannelId) -> Vec<(GuildId, UserId)> {
        self.guilds
            .iter()
            .flat_map(|g| {
                g.voice_states
                    .iter()
                    .filter(move |p| p.channel_id == channel)
                    .map(move |p| (g.guild_id, p.user_id))
            })
            .collect()
    }
}

/// Event delivered by the ingestion adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomEvent {
    /// The gateway session is (re)established
    ConnectionReady,
    /// All guild rosters are in; triggers reconciliation
    Snapshot(PresenceSnapshot),
    /// A voice presence update
    VoiceStateChanged(VoiceStateChange),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ch(id: u64) -> ChannelId {
        ChannelId::new(id).unwrap()
    }

    fn user(id: u64) -> UserId {
        UserId::new(id).unwrap()
    }

    fn guild(id: u64) -> GuildId {
        GuildId::new(id).unwrap()
    }

    #[test]
    fn same_channel_update_is_neither_departure_nor_arrival() {
        // mute/deafen toggles re-deliver the same channel
        let change = VoiceStateChange::moved(guild(1), user(2), ch(3), ch(3));
        assert_eq!(change.departed(), None);
        assert_eq!(change.arrived(), None);
    }

    #[test]
    fn move_is_departure_then_arrival() {
        let change = VoiceStateChange::moved(guild(1), user(2), ch(3), ch(4));
        assert_eq!(change.departed(), Some(ch(3)));
        assert_eq!(change.arrived(), Some(ch(4)));
    }

    #[test]
    fn snapshot_counts_occupants_across_guilds() {
        let snapshot = PresenceSnapshot {
            guilds: vec![
                GuildSnapshot {
                    guild_id: guild(1),
                    voice_states: vec![
                        VoicePresence { user_id: user(10), channel_id: ch(100) },
                        VoicePresence { user_id: user(11), channel_id: ch(100) },
                    ],
                },
                GuildSnapshot {
                    guild_id: guild(2),
                    voice_states: vec![VoicePresence { user_id: user(12), channel_id: ch(200) }],
                },
            ],
        };

        let counts = snapshot.occupancy();
        assert_eq!(counts.get(&ch(100)), Some(&2));
        assert_eq!(counts.get(&ch(200)), Some(&1));
        assert_eq!(counts.get(&ch(300)), None);
        assert_eq!(
            snapshot.occupants_of(ch(200)),
            vec![(guild(2), user(12))]
        );
    }
}
