// Discord Platform Adapter
//
// REST calls behind the room service's remote directory, plus the gateway
// loop that feeds voice presence into the service's event queue. Built on
// twilight-rs.

use crate::adapter::{
    from_channel, from_guild, from_user, to_channel, to_guild, to_overwrite_target, to_user,
    ChannelError,
};
use crate::presence::IngestState;
use async_trait::async_trait;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use twilight_gateway::{
    ConfigBuilder, Event, EventTypeFlags, Intents, Shard, ShardId, StreamExt as TwilightStreamExt,
};
use twilight_http::Client as HttpClient;
use twilight_model::channel::ChannelType;
use twilight_model::gateway::payload::incoming::GuildCreate;
use twilight_model::gateway::payload::outgoing::update_presence::UpdatePresencePayload;
use twilight_model::gateway::presence::{ActivityType, MinimalActivity, Status};
use twilight_model::guild::Permissions;
use twilight_model::http::permission_overwrite::{PermissionOverwrite, PermissionOverwriteType};
use voxroom_core::{
    ChannelId, ChannelMetadata, GuildId, RemoteDirectory, RemoteOp, RoomEvent, RoomRequest,
    UserId, UserProfile, VoicePresence, VoxroomError,
};

/// Guild membership plus voice states; neither is privileged
pub const INTENTS: Intents = Intents::GUILDS.union(Intents::GUILD_VOICE_STATES);

/// How long to wait for guild rosters after Ready before reconciling anyway
pub const DEFAULT_SNAPSHOT_GRACE: Duration = Duration::from_secs(30);

/// Permissions granted to a room's owner
pub const OWNER_PERMISSIONS: Permissions =
    Permissions::MANAGE_CHANNELS.union(Permissions::MOVE_MEMBERS);

fn event_types() -> EventTypeFlags {
    EventTypeFlags::READY
        | EventTypeFlags::GUILD_CREATE
        | EventTypeFlags::GUILD_DELETE
        | EventTypeFlags::VOICE_STATE_UPDATE
}

/// Discord adapter configuration
#[derive(Debug, Clone)]
pub struct DiscordConfig {
    /// Bot token
    pub bot_token: String,

    /// "Playing ..." activity shown on the bot
    pub activity: Option<String>,

    pub snapshot_grace: Duration,
}

impl DiscordConfig {
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            activity: None,
            snapshot_grace: DEFAULT_SNAPSHOT_GRACE,
        }
    }

    pub fn with_activity(mut self, activity: Option<String>) -> Self {
        self.activity = activity.filter(|a| !a.trim().is_empty());
        self
    }
}

fn failed<E: Display>(operation: RemoteOp) -> impl FnOnce(E) -> VoxroomError {
    move |e| VoxroomError::remote(operation, e.to_string())
}

/// Positions are signed in the channel model but unsigned in requests
fn request_position(position: Option<i32>) -> Option<u64> {
    position.and_then(|p| u64::try_from(p).ok())
}

pub fn owner_overwrite(user: UserId) -> PermissionOverwrite {
    PermissionOverwrite {
        allow: Some(OWNER_PERMISSIONS),
        deny: None,
        id: to_overwrite_target(user),
        kind: PermissionOverwriteType::Member,
    }
}

pub fn presence_payload(
    activity: Option<&str>,
) -> Result<Option<UpdatePresencePayload>, ChannelError> {
    let Some(name) = activity else {
        return Ok(None);
    };
    let activity = MinimalActivity {
        kind: ActivityType::Playing,
        name: name.to_string(),
        url: None,
    };
    UpdatePresencePayload::new(vec![activity.into()], false, None, Status::Online)
        .map(Some)
        .map_err(|e| ChannelError::PresenceRejected {
            source: e.to_string(),
        })
}

// ============================================================================
// REST
// ============================================================================

/// Remote directory backed by the Discord REST API
pub struct DiscordDirectory {
    http: Arc<HttpClient>,
}

impl DiscordDirectory {
    pub fn new(bot_token: String) -> Self {
        Self {
            http: Arc::new(HttpClient::new(bot_token)),
        }
    }
}

#[async_trait]
impl RemoteDirectory for DiscordDirectory {
    async fn create_room(&self, request: &RoomRequest) -> Result<ChannelId, VoxroomError> {
        let mut create = self
            .http
            .create_guild_channel(to_guild(request.guild_id), &request.name)
            .kind(ChannelType::GuildVoice);
        if let Some(parent) = request.parent_id {
            create = create.parent_id(to_channel(parent));
        }
        if let Some(position) = request_position(request.position) {
            create = create.position(position);
        }

        let channel = create
            .await
            .map_err(failed(RemoteOp::CreateRoom))?
            .model()
            .await
            .map_err(failed(RemoteOp::CreateRoom))?;

        tracing::debug!("Created voice channel {} ({})", channel.id, request.name);
        Ok(from_channel(channel.id))
    }

    async fn place_room(
        &self,
        room: ChannelId,
        parent_id: Option<ChannelId>,
        position: Option<i32>,
    ) -> Result<(), VoxroomError> {
        let mut update = self
            .http
            .update_channel(to_channel(room))
            .parent_id(parent_id.map(to_channel));
        if let Some(position) = request_position(position) {
            update = update.position(position);
        }
        update.await.map_err(failed(RemoteOp::PlaceRoom))?;
        Ok(())
    }

    async fn delete_room(&self, room: ChannelId) -> Result<(), VoxroomError> {
        self.http
            .delete_channel(to_channel(room))
            .await
            .map_err(failed(RemoteOp::DeleteRoom))?;
        Ok(())
    }

    async fn move_user(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        room: ChannelId,
    ) -> Result<(), VoxroomError> {
        self.http
            .update_guild_member(to_guild(guild_id), to_user(user_id))
            .channel_id(Some(to_channel(room)))
            .await
            .map_err(failed(RemoteOp::MoveUser))?;
        Ok(())
    }

    async fn set_owner_permissions(
        &self,
        room: ChannelId,
        user_id: UserId,
    ) -> Result<(), VoxroomError> {
        let overwrite = owner_overwrite(user_id);
        self.http
            .update_channel_permission(to_channel(room), &overwrite)
            .await
            .map_err(failed(RemoteOp::SetPermissions))?;
        Ok(())
    }

    async fn get_channel(&self, channel: ChannelId) -> Result<ChannelMetadata, VoxroomError> {
        let channel = self
            .http
            .channel(to_channel(channel))
            .await
            .map_err(failed(RemoteOp::GetChannel))?
            .model()
            .await
            .map_err(failed(RemoteOp::GetChannel))?;

        Ok(ChannelMetadata {
            id: from_channel(channel.id),
            name: channel.name,
            parent_id: channel.parent_id.map(from_channel),
            position: channel.position,
        })
    }

    async fn get_user(&self, user_id: UserId) -> Result<UserProfile, VoxroomError> {
        let user = self
            .http
            .user(to_user(user_id))
            .await
            .map_err(failed(RemoteOp::GetUser))?
            .model()
            .await
            .map_err(failed(RemoteOp::GetUser))?;

        Ok(UserProfile {
            id: from_user(user.id),
            username: user.name,
            global_name: user.global_name,
        })
    }
}

// ============================================================================
// Gateway
// ============================================================================

/// Gateway connection feeding the room service
pub struct DiscordGateway {
    config: DiscordConfig,
    events: mpsc::Sender<RoomEvent>,
}

impl DiscordGateway {
    pub fn new(config: DiscordConfig, events: mpsc::Sender<RoomEvent>) -> Self {
        Self { config, events }
    }

    /// Receive gateway events until `shutdown` resolves or the connection
    /// ends for good. Dropping the gateway closes the event queue.
    pub async fn run<F>(self, shutdown: F) -> Result<(), ChannelError>
    where
        F: Future<Output = ()>,
    {
        if self.config.bot_token.trim().is_empty() {
            return Err(ChannelError::AuthenticationFailed {
                platform: "discord".to_string(),
                source: "bot token is empty".to_string(),
            });
        }

        let mut builder = ConfigBuilder::new(self.config.bot_token.clone(), INTENTS);
        if let Some(presence) = presence_payload(self.config.activity.as_deref())? {
            builder = builder.presence(presence);
        }

        tracing::info!("Creating Discord Gateway shard with intents: {:?}", INTENTS);
        let mut shard = Shard::with_config(ShardId::ONE, builder.build());

        let mut state = IngestState::new();
        let mut deadline: Option<Instant> = None;
        tokio::pin!(shutdown);

        loop {
            let grace = async move {
                match deadline {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Shutdown requested, leaving the gateway");
                    break;
                }
                _ = grace => {
                    deadline = None;
                    if let Some(event) = state.flush() {
                        self.forward(event).await?;
                    }
                }
                item = shard.next_event(event_types()) => {
                    let event = match item {
                        Some(Ok(event)) => event,
                        Some(Err(e)) => {
                            report_receive_error(&e);
                            continue;
                        }
                        None => {
                            tracing::info!("Discord Gateway stream ended");
                            break;
                        }
                    };

                    let is_ready = matches!(event, Event::Ready(_));
                    for out in translate(&mut state, event) {
                        self.forward(out).await?;
                    }

                    if !state.is_assembling() {
                        deadline = None;
                    } else if is_ready || deadline.is_none() {
                        deadline = Some(Instant::now() + self.config.snapshot_grace);
                    }
                }
            }
        }

        Ok(())
    }

    async fn forward(&self, event: RoomEvent) -> Result<(), ChannelError> {
        self.events
            .send(event)
            .await
            .map_err(|_| ChannelError::EventQueueClosed)
    }
}

fn report_receive_error(error: &impl Display) {
    tracing::error!("Error receiving Discord event: {}", error);

    let error_str = error.to_string().to_lowercase();
    if error_str.contains("401") || error_str.contains("unauthorized") {
        tracing::error!("❌ Discord Bot Token is invalid or expired!");
        tracing::error!("Please check your DISCORD_BOT_TOKEN environment variable");
    } else if error_str.contains("403") {
        tracing::error!(
            "❌ Bot lacks permissions. It needs Manage Channels and Move Members in every guild"
        );
    }
}

fn translate(state: &mut IngestState, event: Event) -> Vec<RoomEvent> {
    match event {
        Event::Ready(ready) => state.on_ready(ready.guilds.iter().map(|g| from_guild(g.id))),
        Event::GuildCreate(create) => match *create {
            GuildCreate::Available(guild) => {
                let presences = guild
                    .voice_states
                    .iter()
                    .filter_map(|voice| {
                        Some(VoicePresence {
                            user_id: from_user(voice.user_id),
                            channel_id: from_channel(voice.channel_id?),
                        })
                    })
                    .collect();
                state.on_guild_available(from_guild(guild.id), presences)
            }
            GuildCreate::Unavailable(guild) => state.on_guild_unavailable(from_guild(guild.id)),
        },
        Event::GuildDelete(delete) => {
            state.on_guild_removed(from_guild(delete.id));
            Vec::new()
        }
        Event::VoiceStateUpdate(update) => {
            let voice = &update.0;
            let Some(guild) = voice.guild_id else {
                return Vec::new();
            };
            state
                .on_voice_state(
                    from_guild(guild),
                    from_user(voice.user_id),
                    voice.channel_id.map(from_channel),
                )
                .into_iter()
                .collect()
        }
        _ => Vec::new(),
    }
}
