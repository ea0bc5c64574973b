//! In-memory fakes shared by the unit tests of this crate.

use crate::directory::{ChannelMetadata, RemoteDirectory, RoomRequest, UserProfile};
use crate::error::{RemoteOp, VoxroomError};
use crate::ledger::Ledger;
use crate::model::{ChannelId, GuildId, UserId};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub fn ch(id: u64) -> ChannelId {
    ChannelId::new(id).unwrap()
}

pub fn user(id: u64) -> UserId {
    UserId::new(id).unwrap()
}

pub fn guild(id: u64) -> GuildId {
    GuildId::new(id).unwrap()
}

/// Category every fake lobby lives in
pub const LOBBY_PARENT: u64 = 900;
/// Position every fake lobby reports
pub const LOBBY_POSITION: i32 = 4;
/// First ID handed out by `RecordingDirectory::create_room`
pub const FIRST_ROOM_ID: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Create(RoomRequest),
    Place(ChannelId),
    Delete(ChannelId),
    Move { user: UserId, room: ChannelId },
    Permissions { user: UserId, room: ChannelId },
    GetChannel(ChannelId),
    GetUser(UserId),
}

/// Remote directory that records every call and hands out sequential room IDs
#[derive(Debug)]
pub struct RecordingDirectory {
    calls: Mutex<Vec<Call>>,
    next_id: AtomicU64,
    failing: Mutex<HashSet<RemoteOp>>,
    hanging: Mutex<HashSet<RemoteOp>>,
}

impl Default for RecordingDirectory {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(FIRST_ROOM_ID),
            failing: Mutex::new(HashSet::new()),
            hanging: Mutex::new(HashSet::new()),
        }
    }
}

impl RecordingDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, op: RemoteOp) {
        self.failing.lock().unwrap().insert(op);
    }

    pub fn recover(&self, op: RemoteOp) {
        self.failing.lock().unwrap().remove(&op);
    }

    /// Make `op` never answer
    pub fn hang(&self, op: RemoteOp) {
        self.hanging.lock().unwrap().insert(op);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn creates(&self) -> Vec<RoomRequest> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Create(request) => Some(request),
                _ => None,
            })
            .collect()
    }

    pub fn deletes(&self) -> Vec<ChannelId> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Delete(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    async fn record(&self, op: RemoteOp, call: Call) -> Result<(), VoxroomError> {
        self.calls.lock().unwrap().push(call);
        let hangs = self.hanging.lock().unwrap().contains(&op);
        if hangs {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if self.failing.lock().unwrap().contains(&op) {
            return Err(VoxroomError::remote(op, "injected failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteDirectory for RecordingDirectory {
    async fn create_room(&self, request: &RoomRequest) -> Result<ChannelId, VoxroomError> {
        self.record(RemoteOp::CreateRoom, Call::Create(request.clone()))
            .await?;
        Ok(ch(self.next_id.fetch_add(1, Ordering::SeqCst)))
    }

    async fn place_room(
        &self,
        room: ChannelId,
        _parent_id: Option<ChannelId>,
        _position: Option<i32>,
    ) -> Result<(), VoxroomError> {
        self.record(RemoteOp::PlaceRoom, Call::Place(room)).await
    }

    async fn delete_room(&self, room: ChannelId) -> Result<(), VoxroomError> {
        self.record(RemoteOp::DeleteRoom, Call::Delete(room)).await
    }

    async fn move_user(
        &self,
        _guild_id: GuildId,
        user_id: UserId,
        room: ChannelId,
    ) -> Result<(), VoxroomError> {
        self.record(RemoteOp::MoveUser, Call::Move { user: user_id, room })
            .await
    }

    async fn set_owner_permissions(
        &self,
        room: ChannelId,
        user_id: UserId,
    ) -> Result<(), VoxroomError> {
        self.record(
            RemoteOp::SetPermissions,
            Call::Permissions { user: user_id, room },
        )
        .await
    }

    async fn get_channel(&self, channel: ChannelId) -> Result<ChannelMetadata, VoxroomError> {
        self.record(RemoteOp::GetChannel, Call::GetChannel(channel))
            .await?;
        Ok(ChannelMetadata {
            id: channel,
            name: Some(format!("lobby-{}", channel)),
            parent_id: Some(ch(LOBBY_PARENT)),
            position: Some(LOBBY_POSITION),
        })
    }

    async fn get_user(&self, user_id: UserId) -> Result<UserProfile, VoxroomError> {
        self.record(RemoteOp::GetUser, Call::GetUser(user_id)).await?;
        Ok(UserProfile {
            id: user_id,
            username: format!("user{}", user_id),
            global_name: Some(format!("User {}", user_id)),
        })
    }
}

/// Ledger whose every operation fails
#[derive(Debug, Default)]
pub struct BrokenLedger;

#[async_trait]
impl Ledger for BrokenLedger {
    async fn add(&self, _id: ChannelId) -> Result<(), VoxroomError> {
        Err(VoxroomError::ledger("add", "disk I/O error"))
    }

    async fn remove(&self, _id: ChannelId) -> Result<(), VoxroomError> {
        Err(VoxroomError::ledger("remove", "disk I/O error"))
    }

    async fn list_all(&self) -> Result<Vec<ChannelId>, VoxroomError> {
        Err(VoxroomError::ledger("list_all", "disk I/O error"))
    }

    async fn clear_all(&self) -> Result<(), VoxroomError> {
        Err(VoxroomError::ledger("clear_all", "disk I/O error"))
    }
}
