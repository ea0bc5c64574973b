//! Remote Directory contract
//!
//! Request/response calls against the chat platform. Every call may fail or
//! hang; the lifecycle controller bounds each one with a timeout and never
//! assumes success.

use crate::error::VoxroomError;
use crate::model::{ChannelId, GuildId, UserId};
use async_trait::async_trait;

/// Channel metadata needed to place a new room next to its lobby
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMetadata {
    pub id: ChannelId,
    pub name: Option<String>,
    pub parent_id: Option<ChannelId>,
    pub position: Option<i32>,
}

/// User profile fields used to name a room
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub id: UserId,
    pub username: String,
    pub global_name: Option<String>,
}

impl UserProfile {
    /// The global display name, falling back to the account name.
    pub fn display_name(&self) -> &str {
        self.global_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.username)
    }
}

/// Parameters of a room creation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomRequest {
    pub guild_id: GuildId,
    pub name: String,
    pub parent_id: Option<ChannelId>,
    pub position: Option<i32>,
}

#[async_trait]
pub trait RemoteDirectory: Send + Sync {
    /// Create a voice channel and return its ID
    async fn create_room(&self, request: &RoomRequest) -> Result<ChannelId, VoxroomError>;

    /// Move a room under `parent_id` at `position`
    async fn place_room(
        &self,
        room: ChannelId,
        parent_id: Option<ChannelId>,
        position: Option<i32>,
    ) -> Result<(), VoxroomError>;

    async fn delete_room(&self, room: ChannelId) -> Result<(), VoxroomError>;

    async fn move_user(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        room: ChannelId,
    ) -> Result<(), VoxroomError>;

    /// Grant `user_id` manage-channel and move-members on `room`
    async fn set_owner_permissions(
        &self,
        room: ChannelId,
        user_id: UserId,
    ) -> Result<(), VoxroomError>;

    async fn get_channel(&self, channel: ChannelId) -> Result<ChannelMetadata, VoxroomError>;

    async fn get_user(&self, user_id: UserId) -> Result<UserProfile, VoxroomError>;
}
