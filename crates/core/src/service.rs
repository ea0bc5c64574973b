//! Room service: the single ordering domain.
//!
//! One task owns the lifecycle controller and drains the event queue, so the
//! registry and the ledger only ever have one writer. Voice changes arriving
//! before the startup snapshot are held back and replayed once reconciliation
//! is done.

use crate::events::{PresenceSnapshot, RoomEvent, VoiceStateChange};
use crate::lifecycle::LifecycleController;
use crate::reconcile::{ReconcileReport, Reconciler};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Capacity of the channel between the gateway adapter and the service
pub const EVENT_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for the first presence snapshot
    AwaitingSnapshot,
    /// Reconciled; processing voice changes as they come
    Running,
}

pub struct RoomService {
    controller: LifecycleController,
    reconciler: Reconciler,
    phase: Phase,
    backlog: Vec<VoiceStateChange>,
}

impl RoomService {
    pub fn new(controller: LifecycleController, reconciler: Reconciler) -> Self {
        Self {
            controller,
            reconciler,
            phase: Phase::AwaitingSnapshot,
            backlog: Vec::new(),
        }
    }

    /// Create the bounded queue feeding a service
    pub fn channel() -> (mpsc::Sender<RoomEvent>, mpsc::Receiver<RoomEvent>) {
        mpsc::channel(EVENT_QUEUE_CAPACITY)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn controller(&self) -> &LifecycleController {
        &self.controller
    }

    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }

    pub async fn handle(&mut self, event: RoomEvent) {
        match event {
            RoomEvent::ConnectionReady => match self.phase {
                Phase::AwaitingSnapshot => info!("Connection ready, waiting for guild snapshots"),
                Phase::Running => info!("Reconnected, keeping current room state"),
            },
            RoomEvent::Snapshot(snapshot) => {
                self.reconcile(&snapshot).await;
            }
            RoomEvent::VoiceStateChanged(change) => match self.phase {
                Phase::AwaitingSnapshot => {
                    debug!(
                        "Holding voice change of user {} until reconciliation",
                        change.user_id
                    );
                    self.backlog.push(change);
                }
                Phase::Running => {
                    self.controller.handle_voice_change(&change).await;
                }
            },
        }
    }

    /// Reconcile against `snapshot` unless that already happened.
    pub async fn reconcile(&mut self, snapshot: &PresenceSnapshot) -> Option<ReconcileReport> {
        if self.phase == Phase::Running {
            info!("Already reconciled, ignoring new guild snapshot");
            return None;
        }

        let report = self.reconciler.run(&mut self.controller, snapshot).await;
        self.phase = Phase::Running;

        let backlog = std::mem::take(&mut self.backlog);
        if !backlog.is_empty() {
            info!("Replaying {} held voice changes", backlog.len());
        }
        for change in backlog {
            self.controller.handle_voice_change(&change).await;
        }
        Some(report)
    }

    /// Wait for room deletions still running in the background.
    pub async fn settle(&mut self) -> usize {
        self.controller.settle().await
    }

    /// Drain `events` until every sender is gone, then hand the service back.
    pub async fn run(mut self, mut events: mpsc::Receiver<RoomEvent>) -> Self {
        info!("Room service started");
        while let Some(event) = events.recv().await {
            self.handle(event).await;
        }
        let pending = self.controller.pending_deletions();
        if pending > 0 {
            info!("Waiting for {} room deletions to finish", pending);
        }
        self.settle().await;
        info!(
            "Room service stopped with {} rooms tracked",
            self.controller.registry().len()
        );
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RemoteOp;
    use crate::events::{GuildSnapshot, VoicePresence};
    use crate::ledger::{InMemoryLedger, Ledger};
    use crate::lifecycle::ControllerSettings;
    use crate::registry::RoomRegistry;
    use crate::testing::*;
    use std::sync::Arc;
    use std::time::Duration;

    const LOBBY: u64 = 1;
    const GUILD: u64 = 77;

    fn service(ledger_ids: &[u64]) -> (RoomService, Arc<RecordingDirectory>, Arc<InMemoryLedger>) {
        let directory = Arc::new(RecordingDirectory::new());
        let ledger = Arc::new(InMemoryLedger::with_ids(ledger_ids.iter().map(|id| ch(*id))));
        let controller = LifecycleController::new(
            RoomRegistry::new([ch(LOBBY)]),
            directory.clone(),
            ledger.clone(),
            ControllerSettings::default(),
        );
        (
            RoomService::new(controller, Reconciler::default()),
            directory,
            ledger,
        )
    }

    fn snapshot(presences: &[(u64, u64)]) -> PresenceSnapshot {
        PresenceSnapshot {
            guilds: vec![GuildSnapshot {
                guild_id: guild(GUILD),
                voice_states: presences
                    .iter()
                    .map(|(u, c)| VoicePresence {
                        user_id: user(*u),
                        channel_id: ch(*c),
                    })
                    .collect(),
            }],
        }
    }

    #[tokio::test]
    async fn voice_changes_wait_for_reconciliation() {
        let (mut service, directory, _ledger) = service(&[]);

        service.handle(RoomEvent::ConnectionReady).await;
        service
            .handle(RoomEvent::VoiceStateChanged(VoiceStateChange::joined(
                guild(GUILD),
                user(5),
                ch(LOBBY),
            )))
            .await;
        assert_eq!(service.backlog_len(), 1);
        assert!(directory.creates().is_empty());

        service.handle(RoomEvent::Snapshot(snapshot(&[]))).await;
        assert_eq!(service.phase(), Phase::Running);
        assert_eq!(service.backlog_len(), 0);
        assert_eq!(directory.creates().len(), 1);
    }

    #[tokio::test]
    async fn later_snapshots_are_ignored() {
        let (mut service, directory, _ledger) = service(&[]);
        assert!(service.reconcile(&snapshot(&[])).await.is_some());
        assert!(service.reconcile(&snapshot(&[(5, LOBBY)])).await.is_none());
        assert!(directory.calls().is_empty());
    }

    #[tokio::test]
    async fn restart_restores_occupied_room() {
        let (mut service, directory, ledger) = service(&[10]);

        service.handle(RoomEvent::ConnectionReady).await;
        service
            .handle(RoomEvent::Snapshot(snapshot(&[(5, 10), (6, 10)])))
            .await;

        let room = service.controller().registry().get(ch(10)).unwrap();
        assert_eq!(room.occupancy, 2);
        assert!(directory.deletes().is_empty());
        assert_eq!(ledger.list_all().await.unwrap(), vec![ch(10)]);
    }

    #[tokio::test]
    async fn hung_delete_does_not_stall_the_queue() {
        let (mut service, directory, _ledger) = service(&[]);
        service.handle(RoomEvent::Snapshot(snapshot(&[]))).await;
        service
            .handle(RoomEvent::VoiceStateChanged(VoiceStateChange::joined(
                guild(GUILD),
                user(5),
                ch(LOBBY),
            )))
            .await;
        let room = ch(FIRST_ROOM_ID);
        directory.hang(RemoteOp::DeleteRoom);

        let started = tokio::time::Instant::now();
        service
            .handle(RoomEvent::VoiceStateChanged(VoiceStateChange::left(
                guild(GUILD),
                user(5),
                room,
            )))
            .await;
        service
            .handle(RoomEvent::VoiceStateChanged(VoiceStateChange::joined(
                guild(GUILD),
                user(6),
                ch(LOBBY),
            )))
            .await;

        assert!(started.elapsed() < Duration::from_millis(500));
        assert!(!service.controller().registry().is_managed(room));
        assert_eq!(directory.creates().len(), 2);
        assert_eq!(service.controller().pending_deletions(), 1);
    }

    #[tokio::test]
    async fn run_drains_queue_until_senders_drop() {
        let (service, directory, ledger) = service(&[]);
        let (tx, rx) = RoomService::channel();
        let worker = tokio::spawn(service.run(rx));

        tx.send(RoomEvent::ConnectionReady).await.unwrap();
        tx.send(RoomEvent::Snapshot(snapshot(&[]))).await.unwrap();
        tx.send(RoomEvent::VoiceStateChanged(VoiceStateChange::joined(
            guild(GUILD),
            user(5),
            ch(LOBBY),
        )))
        .await
        .unwrap();
        let room = ch(FIRST_ROOM_ID);
        tx.send(RoomEvent::VoiceStateChanged(VoiceStateChange::moved(
            guild(GUILD),
            user(5),
            ch(LOBBY),
            room,
        )))
        .await
        .unwrap();
        tx.send(RoomEvent::VoiceStateChanged(VoiceStateChange::left(
            guild(GUILD),
            user(5),
            room,
        )))
        .await
        .unwrap();
        drop(tx);

        let service = worker.await.unwrap();
        assert!(service.controller().registry().is_empty());
        assert_eq!(directory.creates().len(), 1);
        assert_eq!(directory.deletes(), vec![room]);
        assert!(ledger.list_all().await.unwrap().is_empty());
    }
}
