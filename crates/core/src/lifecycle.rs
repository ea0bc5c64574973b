//! Lifecycle Controller
//!
//! Turns voice presence changes into room creations and deletions. A change is
//! handled in two fixed steps, leave then join, so a user hopping between
//! rooms never observes a room that is being torn down.
//!
//! Failure policy:
//! - profile, lobby metadata or create failure: the join step is abandoned,
//!   nothing is registered or persisted
//! - ledger, placement or permission failure: logged, the room stays tracked
//! - move failure: the owner never arrives, so their reserved slot is released
//!   and the room is deleted if that leaves it empty
//! - delete failure: logged, the room is dropped from local state anyway
//!
//! Remote deletes run as background tasks so a hung delete cannot hold up the
//! event queue; `settle` waits for the outstanding ones.

use crate::directory::{RemoteDirectory, RoomRequest};
use crate::error::{RemoteOp, VoxroomError};
use crate::events::VoiceStateChange;
use crate::ledger::Ledger;
use crate::model::{render_room_name, ChannelId, EphemeralRoom, GuildId, UserId};
use crate::registry::RoomRegistry;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Default pattern for room names; `%s` is the owner's display name
pub const DEFAULT_ROOM_PATTERN: &str = "%s's Room";
/// Default upper bound for a single remote call
pub const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub room_pattern: String,
    pub remote_timeout: Duration,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            room_pattern: DEFAULT_ROOM_PATTERN.to_string(),
            remote_timeout: DEFAULT_REMOTE_TIMEOUT,
        }
    }
}

/// What the leave step did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// No departure, or the channel is not a managed room
    Ignored,
    /// Occupancy dropped to the given count
    Counted(u32),
    /// The room emptied and was deleted
    Deleted(ChannelId),
    /// The room was already being torn down
    AlreadyDeleting,
}

/// What the join step did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// No arrival, or the channel is neither a room nor a lobby
    Ignored,
    /// Occupancy rose to the given count
    Counted(u32),
    /// The owner arrived in the room created for them
    ArrivalConfirmed,
    /// A new room was created for the user
    Created(ChannelId),
    /// A room was created but the owner could not be moved in; it was released
    Abandoned(ChannelId),
    /// Room creation failed; nothing was registered
    CreateFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeOutcome {
    pub leave: LeaveOutcome,
    pub join: JoinOutcome,
}

pub struct LifecycleController {
    registry: RoomRegistry,
    directory: Arc<dyn RemoteDirectory>,
    ledger: Arc<dyn Ledger>,
    settings: ControllerSettings,
    deletions: JoinSet<bool>,
}

impl LifecycleController {
    pub fn new(
        registry: RoomRegistry,
        directory: Arc<dyn RemoteDirectory>,
        ledger: Arc<dyn Ledger>,
        settings: ControllerSettings,
    ) -> Self {
        Self {
            registry,
            directory,
            ledger,
            settings,
            deletions: JoinSet::new(),
        }
    }

    pub fn registry(&self) -> &RoomRegistry {
        &self.registry
    }

    pub(crate) fn registry_mut(&mut self) -> &mut RoomRegistry {
        &mut self.registry
    }

    pub fn ledger(&self) -> &Arc<dyn Ledger> {
        &self.ledger
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    /// Apply one voice presence change: leave step, then join step.
    pub async fn handle_voice_change(&mut self, change: &VoiceStateChange) -> ChangeOutcome {
        let leave = match change.departed() {
            Some(channel) => self.leave(channel).await,
            None => LeaveOutcome::Ignored,
        };
        let join = match change.arrived() {
            Some(channel) => self.join(change.guild_id, change.user_id, channel).await,
            None => JoinOutcome::Ignored,
        };
        ChangeOutcome { leave, join }
    }

    async fn leave(&mut self, channel: ChannelId) -> LeaveOutcome {
        let Some(remaining) = self.registry.decrement_occupancy(channel) else {
            return LeaveOutcome::Ignored;
        };
        if remaining > 0 {
            debug!("Room {} occupancy dropped to {}", channel, remaining);
            return LeaveOutcome::Counted(remaining);
        }
        self.delete_room(channel).await
    }

    /// Join step. Also used by reconciliation for users found in a lobby.
    pub async fn join(&mut self, guild_id: GuildId, user_id: UserId, channel: ChannelId) -> JoinOutcome {
        if self.registry.is_managed(channel) {
            if self.registry.take_pending_arrival(channel, user_id) {
                debug!("Owner {} arrived in room {}", user_id, channel);
                return JoinOutcome::ArrivalConfirmed;
            }
            return match self.registry.increment_occupancy(channel) {
                Some(count) => {
                    debug!("Room {} occupancy rose to {}", channel, count);
                    JoinOutcome::Counted(count)
                }
                None => JoinOutcome::Ignored,
            };
        }

        if !self.registry.is_lobby(channel) {
            return JoinOutcome::Ignored;
        }

        match self.create_room(guild_id, user_id, channel).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Error creating voice room for user {}: {}", user_id, e);
                JoinOutcome::CreateFailed
            }
        }
    }

    async fn create_room(
        &mut self,
        guild_id: GuildId,
        user_id: UserId,
        lobby: ChannelId,
    ) -> Result<JoinOutcome, VoxroomError> {
        let timeout = self.settings.remote_timeout;

        let profile = bounded(timeout, RemoteOp::GetUser, self.directory.get_user(user_id)).await?;
        let lobby_meta =
            bounded(timeout, RemoteOp::GetChannel, self.directory.get_channel(lobby)).await?;

        let request = RoomRequest {
            guild_id,
            name: render_room_name(&self.settings.room_pattern, profile.display_name()),
            parent_id: lobby_meta.parent_id,
            position: lobby_meta.position,
        };
        let room_id =
            bounded(timeout, RemoteOp::CreateRoom, self.directory.create_room(&request)).await?;

        let room = EphemeralRoom::created_for(room_id, user_id, request.parent_id, request.position);
        if !self.registry.upsert(room) {
            return Err(VoxroomError::unknown_channel(room_id));
        }
        if let Err(e) = self.ledger.add(room_id).await {
            warn!(
                "Error saving room {} to the ledger, it will not survive a restart: {}",
                room_id, e
            );
        }
        self.registry.mark_active(room_id);
        info!(
            "Voice room '{}' ({}) has been created for '{}'",
            request.name,
            room_id,
            profile.display_name()
        );

        if let Err(e) = bounded(
            timeout,
            RemoteOp::PlaceRoom,
            self.directory
                .place_room(room_id, request.parent_id, request.position),
        )
        .await
        {
            warn!("Error placing room {} next to lobby {}: {}", room_id, lobby, e);
        }

        if let Err(e) = bounded(
            timeout,
            RemoteOp::MoveUser,
            self.directory.move_user(guild_id, user_id, room_id),
        )
        .await
        {
            warn!(
                "Error moving user {} into room {}, releasing it: {}",
                user_id, room_id, e
            );
            self.registry.take_pending_arrival(room_id, user_id);
            if self.registry.decrement_occupancy(room_id) == Some(0) {
                self.delete_room(room_id).await;
            }
            return Ok(JoinOutcome::Abandoned(room_id));
        }

        if let Err(e) = bounded(
            timeout,
            RemoteOp::SetPermissions,
            self.directory.set_owner_permissions(room_id, user_id),
        )
        .await
        {
            warn!(
                "Error granting room {} permissions to user {}: {}",
                room_id, user_id, e
            );
        }

        Ok(JoinOutcome::Created(room_id))
    }

    /// Tear down an empty room. Only the first caller gets past `begin_deletion`.
    async fn delete_room(&mut self, room_id: ChannelId) -> LeaveOutcome {
        if !self.registry.begin_deletion(room_id) {
            debug!("Room {} is already being deleted", room_id);
            return LeaveOutcome::AlreadyDeleting;
        }
        self.retire(room_id).await;
        self.registry.remove(room_id);
        LeaveOutcome::Deleted(room_id)
    }

    /// Forget `room_id` in the ledger, then delete it remotely in the
    /// background.
    ///
    /// The ledger goes first: once it is gone from the ledger a crash can no
    /// longer resurrect it, even if the remote delete never happens.
    pub(crate) async fn retire(&mut self, room_id: ChannelId) {
        if let Err(e) = self.ledger.remove(room_id).await {
            warn!("Error deleting room {} from the ledger: {}", room_id, e);
        }

        while self.deletions.try_join_next().is_some() {}

        let directory = Arc::clone(&self.directory);
        let timeout = self.settings.remote_timeout;
        self.deletions.spawn(async move {
            match bounded(timeout, RemoteOp::DeleteRoom, directory.delete_room(room_id)).await {
                Ok(()) => {
                    info!("Voice room {} has been deleted", room_id);
                    true
                }
                Err(e) => {
                    warn!("Error deleting voice room {}, dropping it anyway: {}", room_id, e);
                    false
                }
            }
        });
    }

    /// Remote deletes still in flight
    pub fn pending_deletions(&self) -> usize {
        self.deletions.len()
    }

    /// Wait for every in-flight remote delete; returns how many failed.
    pub async fn settle(&mut self) -> usize {
        let mut failed = 0;
        while let Some(result) = self.deletions.join_next().await {
            match result {
                Ok(true) => {}
                Ok(false) => failed += 1,
                Err(e) => {
                    warn!("Room deletion task failed: {}", e);
                    failed += 1;
                }
            }
        }
        failed
    }
}

/// Run a remote call under `timeout`; an elapsed timer counts as a failed call.
async fn bounded<T, F>(timeout: Duration, op: RemoteOp, call: F) -> Result<T, VoxroomError>
where
    F: Future<Output = Result<T, VoxroomError>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(VoxroomError::remote(
            op,
            format!("timed out after {}ms", timeout.as_millis()),
        )),
    }
}
