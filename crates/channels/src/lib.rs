// Platform Adapters for the Room Service
//
// This crate connects the room service to Discord: REST calls for the
// remote directory and a gateway loop producing room events.

pub mod adapter;
pub mod platforms;
pub mod presence;

pub use adapter::ChannelError;
pub use platforms::discord::{DiscordConfig, DiscordDirectory, DiscordGateway};
pub use presence::{IngestState, PresenceCache, SnapshotAssembler};
