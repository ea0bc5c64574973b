// Gateway Adapter Interface
//
// Shared error type and conversions between platform snowflakes and the
// identifiers used by the room service.

use twilight_model::id::{
    marker::{ChannelMarker, GenericMarker, GuildMarker, UserMarker},
    Id,
};
use voxroom_core::{ChannelId, GuildId, UserId};

/// Channel error type
#[derive(Debug)]
pub enum ChannelError {
    ConnectionFailed { platform: String, source: String },

    AuthenticationFailed { platform: String, source: String },

    PresenceRejected { source: String },

    /// The room service stopped accepting events
    EventQueueClosed,
}

impl std::fmt::Display for ChannelError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ChannelError::ConnectionFailed { platform, source } => {
                write!(f, "Connection failed to {}: {}", platform, source)
            }
            ChannelError::AuthenticationFailed { platform, source } => {
                write!(f, "Authentication failed for {}: {}", platform, source)
            }
            ChannelError::PresenceRejected { source } => {
                write!(f, "Bot presence rejected: {}", source)
            }
            ChannelError::EventQueueClosed => write!(f, "Room service event queue closed"),
        }
    }
}

impl std::error::Error for ChannelError {}

pub fn to_channel(id: ChannelId) -> Id<ChannelMarker> {
    Id::new(id.get())
}

pub fn to_guild(id: GuildId) -> Id<GuildMarker> {
    Id::new(id.get())
}

pub fn to_user(id: UserId) -> Id<UserMarker> {
    Id::new(id.get())
}

/// Permission overwrites address users and roles through one id space
pub fn to_overwrite_target(id: UserId) -> Id<GenericMarker> {
    to_user(id).cast()
}

pub fn from_channel(id: Id<ChannelMarker>) -> ChannelId {
    ChannelId::from(id.into_nonzero())
}

pub fn from_guild(id: Id<GuildMarker>) -> GuildId {
    GuildId::from(id.into_nonzero())
}

pub fn from_user(id: Id<UserMarker>) -> UserId {
    UserId::from(id.into_nonzero())
}
