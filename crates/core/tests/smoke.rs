// Room Service Smoke Test
//
// Drives the service through its public API with a minimal directory.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use voxroom_core::{
    ChannelId, ChannelMetadata, ControllerSettings, GuildId, GuildSnapshot, InMemoryLedger, Ledger,
    LifecycleController, PresenceSnapshot, Reconciler, RemoteDirectory, RoomEvent, RoomRegistry,
    RoomRequest, RoomService, UserId, UserProfile, VoicePresence, VoiceStateChange, VoxroomError,
};

#[derive(Default)]
struct Directory {
    next_id: AtomicU64,
    created: Mutex<Vec<String>>,
    deleted: Mutex<Vec<ChannelId>>,
}

#[async_trait]
impl RemoteDirectory for Directory {
    async fn create_room(&self, request: &RoomRequest) -> Result<ChannelId, VoxroomError> {
        self.created.lock().unwrap().push(request.name.clone());
        let id = 5000 + self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(ChannelId::new(id).unwrap())
    }

    async fn place_room(
        &self,
        _room: ChannelId,
        _parent_id: Option<ChannelId>,
        _position: Option<i32>,
    ) -> Result<(), VoxroomError> {
        Ok(())
    }

    async fn delete_room(&self, room: ChannelId) -> Result<(), VoxroomError> {
        self.deleted.lock().unwrap().push(room);
        Ok(())
    }

    async fn move_user(&self, _: GuildId, _: UserId, _: ChannelId) -> Result<(), VoxroomError> {
        Ok(())
    }

    async fn set_owner_permissions(&self, _: ChannelId, _: UserId) -> Result<(), VoxroomError> {
        Ok(())
    }

    async fn get_channel(&self, channel: ChannelId) -> Result<ChannelMetadata, VoxroomError> {
        Ok(ChannelMetadata {
            id: channel,
            name: Some("Lobby".to_string()),
            parent_id: None,
            position: Some(0),
        })
    }

    async fn get_user(&self, user_id: UserId) -> Result<UserProfile, VoxroomError> {
        Ok(UserProfile {
            id: user_id,
            username: "alice".to_string(),
            global_name: Some("Alice".to_string()),
        })
    }
}

fn ch(id: u64) -> ChannelId {
    ChannelId::new(id).unwrap()
}

fn user(id: u64) -> UserId {
    UserId::new(id).unwrap()
}

fn guild(id: u64) -> GuildId {
    GuildId::new(id).unwrap()
}

fn service(ledger: Arc<InMemoryLedger>, directory: Arc<Directory>) -> RoomService {
    let controller = LifecycleController::new(
        RoomRegistry::new([ch(1)]),
        directory,
        ledger,
        ControllerSettings::default(),
    );
    RoomService::new(controller, Reconciler::default())
}

#[tokio::test]
async fn room_lives_while_occupied() {
    let ledger = Arc::new(InMemoryLedger::new());
    let directory = Arc::new(Directory::default());
    let (tx, rx) = RoomService::channel();
    let worker = tokio::spawn(service(ledger.clone(), directory.clone()).run(rx));

    tx.send(RoomEvent::ConnectionReady).await.unwrap();
    tx.send(RoomEvent::Snapshot(PresenceSnapshot::default()))
        .await
        .unwrap();
    tx.send(RoomEvent::VoiceStateChanged(VoiceStateChange::joined(
        guild(9),
        user(2),
        ch(1),
    )))
    .await
    .unwrap();
    tx.send(RoomEvent::VoiceStateChanged(VoiceStateChange::moved(
        guild(9),
        user(2),
        ch(1),
        ch(5000),
    )))
    .await
    .unwrap();
    drop(tx);

    let service = worker.await.unwrap();
    let room = service.controller().registry().get(ch(5000)).unwrap();
    assert_eq!(room.occupancy, 1);
    assert_eq!(*directory.created.lock().unwrap(), vec!["Alice's Room"]);
    assert_eq!(ledger.list_all().await.unwrap(), vec![ch(5000)]);
}

#[tokio::test]
async fn restart_keeps_occupied_and_drops_stale_rooms() {
    let ledger = Arc::new(InMemoryLedger::with_ids([ch(40), ch(41)]));
    let directory = Arc::new(Directory::default());
    let mut service = service(ledger.clone(), directory.clone());

    let snapshot = PresenceSnapshot {
        guilds: vec![GuildSnapshot {
            guild_id: guild(9),
            voice_states: vec![
                VoicePresence {
                    user_id: user(2),
                    channel_id: ch(40),
                },
                VoicePresence {
                    user_id: user(3),
                    channel_id: ch(40),
                },
            ],
        }],
    };
    let report = service.reconcile(&snapshot).await.unwrap();
    assert_eq!(service.settle().await, 0);

    assert_eq!(report.restored, vec![(ch(40), 2)]);
    assert_eq!(report.deleted, vec![ch(41)]);
    assert_eq!(*directory.deleted.lock().unwrap(), vec![ch(41)]);
    assert_eq!(ledger.list_all().await.unwrap(), vec![ch(40)]);
}
