// Voice Presence Tracking
//
// The gateway only reports where a user is now. The cache remembers where
// each user was so every update can be turned into a previous/current pair,
// and the assembler collects the per-guild rosters that follow a Ready into a
// single startup snapshot.

use std::collections::{BTreeSet, HashMap, HashSet};
use voxroom_core::{
    ChannelId, GuildId, GuildSnapshot, PresenceSnapshot, RoomEvent, UserId, VoicePresence,
    VoiceStateChange,
};

/// Last known voice channel of every user, per guild
#[derive(Debug, Default)]
pub struct PresenceCache {
    guilds: HashMap<GuildId, HashMap<UserId, ChannelId>>,
    /// Last roster of guilds that went away, kept to diff against on return
    departed: HashMap<GuildId, HashMap<UserId, ChannelId>>,
}

impl PresenceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the roster of `guild` has been received
    pub fn knows(&self, guild: GuildId) -> bool {
        self.guilds.contains_key(&guild)
    }

    /// Replace the roster of `guild`.
    ///
    /// Returns the differences against the previous roster, or `None` if the
    /// guild was never seen before. A guild that was removed and came back is
    /// diffed against the roster it had when it left.
    pub fn replace_guild(
        &mut self,
        guild: GuildId,
        presences: &[VoicePresence],
    ) -> Option<Vec<VoiceStateChange>> {
        let roster: HashMap<UserId, ChannelId> = presences
            .iter()
            .map(|p| (p.user_id, p.channel_id))
            .collect();
        let old = self
            .guilds
            .insert(guild, roster.clone())
            .or_else(|| self.departed.remove(&guild))?;

        let users: BTreeSet<UserId> = old.keys().chain(roster.keys()).copied().collect();
        let changes = users
            .into_iter()
            .filter_map(|user| {
                let previous = old.get(&user).copied();
                let current = roster.get(&user).copied();
                (previous != current).then_some(VoiceStateChange {
                    guild_id: guild,
                    user_id: user,
                    previous,
                    current,
                })
            })
            .collect();
        Some(changes)
    }

    /// Record `user`'s new channel and return the one they were in.
    ///
    /// Unknown guilds are left alone and yield `None`.
    pub fn update(
        &mut self,
        guild: GuildId,
        user: UserId,
        channel: Option<ChannelId>,
    ) -> Option<ChannelId> {
        let roster = self.guilds.get_mut(&guild)?;
        match channel {
            Some(channel) => roster.insert(user, channel),
            None => roster.remove(&user),
        }
    }

    /// Stop tracking `guild`; its roster is set aside until it returns.
    pub fn forget_guild(&mut self, guild: GuildId) -> bool {
        match self.guilds.remove(&guild) {
            Some(roster) => {
                self.departed.insert(guild, roster);
                true
            }
            None => false,
        }
    }

    pub fn guild_count(&self) -> usize {
        self.guilds.len()
    }
}

/// Collects guild rosters until every guild announced by Ready is accounted for
#[derive(Debug)]
pub struct SnapshotAssembler {
    expected: HashSet<GuildId>,
    seen: HashSet<GuildId>,
    guilds: Vec<GuildSnapshot>,
}

impl SnapshotAssembler {
    pub fn new(expected: impl IntoIterator<Item = GuildId>) -> Self {
        Self {
            expected: expected.into_iter().collect(),
            seen: HashSet::new(),
            guilds: Vec::new(),
        }
    }

    pub fn record(&mut self, guild: GuildSnapshot) {
        if self.seen.insert(guild.guild_id) {
            self.guilds.push(guild);
        } else if let Some(existing) = self.guilds.iter_mut().find(|g| g.guild_id == guild.guild_id) {
            *existing = guild;
        }
    }

    /// Count an unavailable guild as delivered, with no voice states.
    pub fn mark_unavailable(&mut self, guild: GuildId) {
        self.seen.insert(guild);
    }

    pub fn is_complete(&self) -> bool {
        self.expected.is_subset(&self.seen)
    }

    pub fn missing(&self) -> Vec<GuildId> {
        let mut missing: Vec<GuildId> = self.expected.difference(&self.seen).copied().collect();
        missing.sort();
        missing
    }

    pub fn finish(self) -> PresenceSnapshot {
        PresenceSnapshot {
            guilds: self.guilds,
        }
    }
}

/// Turns raw gateway notifications into room events.
#[derive(Debug, Default)]
pub struct IngestState {
    cache: PresenceCache,
    pending: Option<SnapshotAssembler>,
    delivered: bool,
}

impl IngestState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache(&self) -> &PresenceCache {
        &self.cache
    }

    /// Whether guild rosters are still being collected
    pub fn is_assembling(&self) -> bool {
        self.pending.is_some()
    }

    /// A session was (re)established and announced `guilds`.
    pub fn on_ready(&mut self, guilds: impl IntoIterator<Item = GuildId>) -> Vec<RoomEvent> {
        let assembler = SnapshotAssembler::new(guilds);
        tracing::info!(
            "Gateway ready, expecting {} guild rosters",
            assembler.expected.len()
        );

        let mut events = vec![RoomEvent::ConnectionReady];
        self.pending = Some(assembler);
        events.extend(self.complete_if_ready());
        events
    }

    pub fn on_guild_available(
        &mut self,
        guild: GuildId,
        presences: Vec<VoicePresence>,
    ) -> Vec<RoomEvent> {
        let diff = self.cache.replace_guild(guild, &presences);
        let mut events = Vec::new();

        // Once the service has reconciled, rosters only matter as changes:
        // drift for a known guild, plain arrivals for one it never saw.
        if self.delivered {
            let changes = diff.unwrap_or_else(|| {
                presences
                    .iter()
                    .map(|p| VoiceStateChange::joined(guild, p.user_id, p.channel_id))
                    .collect()
            });
            if !changes.is_empty() {
                tracing::info!(
                    "Guild {} roster brought {} voice changes",
                    guild,
                    changes.len()
                );
                events.extend(changes.into_iter().map(RoomEvent::VoiceStateChanged));
            }
        }

        if let Some(assembler) = self.pending.as_mut() {
            assembler.record(GuildSnapshot {
                guild_id: guild,
                voice_states: presences,
            });
        }
        events.extend(self.complete_if_ready());
        events
    }

    pub fn on_guild_unavailable(&mut self, guild: GuildId) -> Vec<RoomEvent> {
        tracing::warn!("Guild {} is unavailable", guild);
        if let Some(assembler) = self.pending.as_mut() {
            assembler.mark_unavailable(guild);
        }
        self.complete_if_ready().into_iter().collect()
    }

    pub fn on_guild_removed(&mut self, guild: GuildId) {
        if self.cache.forget_guild(guild) {
            tracing::info!("Guild {} removed, voice roster dropped", guild);
        }
    }

    /// A single user's voice state update.
    pub fn on_voice_state(
        &mut self,
        guild: GuildId,
        user: UserId,
        channel: Option<ChannelId>,
    ) -> Option<RoomEvent> {
        if !self.cache.knows(guild) {
            tracing::debug!(
                "Dropping voice update of user {} in guild {} before its roster arrived",
                user,
                guild
            );
            return None;
        }

        let previous = self.cache.update(guild, user, channel);
        if previous == channel {
            return None;
        }
        Some(RoomEvent::VoiceStateChanged(VoiceStateChange {
            guild_id: guild,
            user_id: user,
            previous,
            current: channel,
        }))
    }

    /// Deliver whatever has been collected, even if guilds are missing.
    pub fn flush(&mut self) -> Option<RoomEvent> {
        let assembler = self.pending.take()?;
        let missing = assembler.missing();
        if !missing.is_empty() {
            tracing::warn!(
                "Guild rosters still missing for {:?}, reconciling without them",
                missing
            );
        }
        self.delivered = true;
        Some(RoomEvent::Snapshot(assembler.finish()))
    }

    fn complete_if_ready(&mut self) -> Option<RoomEvent> {
        if self.pending.as_ref().is_some_and(SnapshotAssembler::is_complete) {
            self.flush()
        } else {
            None
        }
    }
}
