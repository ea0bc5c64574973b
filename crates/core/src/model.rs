//! Identifiers and the ephemeral room record.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::num::NonZeroU64;
use std::str::FromStr;

// ============================================================================
// Identifiers
// ============================================================================

/// Error returned when an identifier cannot be parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    pub input: String,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid snowflake id: '{}'", self.input)
    }
}

impl std::error::Error for ParseIdError {}

macro_rules! snowflake_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u64);

        impl $name {
            /// Returns `None` for zero, which the platform never assigns.
            pub const fn new(raw: u64) -> Option<Self> {
                if raw == 0 {
                    None
                } else {
                    Some(Self(raw))
                }
            }

            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl From<NonZeroU64> for $name {
            fn from(raw: NonZeroU64) -> Self {
                Self(raw.get())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim()
                    .parse::<u64>()
                    .ok()
                    .and_then(Self::new)
                    .ok_or_else(|| ParseIdError {
                        input: s.to_string(),
                    })
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                deserializer.deserialize_any(IdVisitor).and_then(|raw| {
                    Self::new(raw).ok_or_else(|| de::Error::custom("snowflake id cannot be zero"))
                })
            }
        }
    };
}

/// Accepts ids written either as integers or as decimal strings
struct IdVisitor;

impl de::Visitor<'_> for IdVisitor {
    type Value = u64;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a snowflake id as integer or decimal string")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<u64, E> {
        Ok(v)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<u64, E> {
        u64::try_from(v).map_err(|_| E::custom("snowflake id cannot be negative"))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<u64, E> {
        v.trim().parse::<u64>().map_err(E::custom)
    }
}

snowflake_id!(
    /// A voice channel, lobby or ephemeral room
    ChannelId
);
snowflake_id!(
    /// A platform user
    UserId
);
snowflake_id!(
    /// A guild (server)
    GuildId
);

// ============================================================================
// Ephemeral rooms
// ============================================================================

/// Where a room sits in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Creating,
    Active,
    Empty,
    Deleting,
    Gone,
}

/// A voice room created and owned by this process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EphemeralRoom {
    pub id: ChannelId,
    /// `None` when the room was rebuilt from the ledger at startup
    pub owner: Option<UserId>,
    pub parent_id: Option<ChannelId>,
    pub position: Option<i32>,
    pub occupancy: u32,
    pub state: LifecycleState,
    /// Owner already counted in `occupancy` whose move-in event is still due
    pub pending_arrival: Option<UserId>,
}

impl EphemeralRoom {
    /// A room that was just created for `owner`, who is counted as the first occupant.
    ///
    /// It stays `Creating` until the ledger has been written.
    pub fn created_for(
        id: ChannelId,
        owner: UserId,
        parent_id: Option<ChannelId>,
        position: Option<i32>,
    ) -> Self {
        Self {
            id,
            owner: Some(owner),
            parent_id,
            position,
            occupancy: 1,
            state: LifecycleState::Creating,
            pending_arrival: Some(owner),
        }
    }

    /// A room recovered from the ledger with a live occupant count.
    pub fn restored(id: ChannelId, occupancy: u32) -> Self {
        Self {
            id,
            owner: None,
            parent_id: None,
            position: None,
            occupancy,
            state: if occupancy == 0 {
                LifecycleState::Empty
            } else {
                LifecycleState::Active
            },
            pending_arrival: None,
        }
    }
}

/// Substitutes `display_name` into the single `%s` of `pattern`.
///
/// Channel names are capped at 100 characters by the platform.
pub fn render_room_name(pattern: &str, display_name: &str) -> String {
    const MAX_CHANNEL_NAME: usize = 100;

    let name = pattern.replacen("%s", display_name, 1);
    if name.chars().count() <= MAX_CHANNEL_NAME {
        name
    } else {
        name.chars().take(MAX_CHANNEL_NAME).collect()
    }
}
