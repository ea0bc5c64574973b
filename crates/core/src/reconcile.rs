//! Reconciliation Engine
//!
//! Runs once at startup. The ledger only says which rooms we *might* still
//! own; the live presence snapshot decides whether each one is still occupied.

use crate::events::PresenceSnapshot;
use crate::lifecycle::{JoinOutcome, LifecycleController};
use crate::model::ChannelId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};

/// How the ledger's rooms are treated at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconcilePolicy {
    /// Keep occupied rooms with their live counts, delete the empty ones
    #[default]
    Reconcile,
    /// Delete every recorded room and start from a clean slate
    Purge,
}

impl fmt::Display for ReconcilePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reconcile => f.write_str("reconcile"),
            Self::Purge => f.write_str("purge"),
        }
    }
}

impl FromStr for ReconcilePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "reconcile" => Ok(Self::Reconcile),
            "purge" => Ok(Self::Purge),
            other => Err(format!(
                "unknown reconcile policy '{}', expected 'reconcile' or 'purge'",
                other
            )),
        }
    }
}

/// Summary of one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Rooms kept with their live occupancy
    pub restored: Vec<(ChannelId, u32)>,
    /// Rooms deleted as stale
    pub deleted: Vec<ChannelId>,
    /// Rooms created for users already sitting in a lobby
    pub created: Vec<ChannelId>,
    /// Ledger rows naming a lobby, dropped without deleting anything
    pub skipped_lobbies: Vec<ChannelId>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Reconciler {
    policy: ReconcilePolicy,
}

impl Reconciler {
    pub fn new(policy: ReconcilePolicy) -> Self {
        Self { policy }
    }

    pub async fn run(
        &self,
        controller: &mut LifecycleController,
        snapshot: &PresenceSnapshot,
    ) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        let live = snapshot.occupancy();

        // Rooms already tracked in memory are candidates too, in case their
        // ledger write failed earlier.
        let mut candidates: BTreeSet<ChannelId> = match controller.ledger().list_all().await {
            Ok(ids) => ids.into_iter().collect(),
            Err(e) => {
                warn!("Error reading the ledger, reconciling without it: {}", e);
                BTreeSet::new()
            }
        };
        candidates.extend(controller.registry().rooms().map(|room| room.id));

        for id in candidates {
            if controller.registry().is_lobby(id) {
                warn!("Ledger names lobby {} as a room; dropping the entry", id);
                if let Err(e) = controller.ledger().remove(id).await {
                    warn!("Error deleting lobby {} from the ledger: {}", id, e);
                }
                report.skipped_lobbies.push(id);
                continue;
            }

            let occupancy = live.get(&id).copied().unwrap_or(0);
            if occupancy > 0 && self.policy == ReconcilePolicy::Reconcile {
                controller.registry_mut().restore(id, occupancy);
                report.restored.push((id, occupancy));
            } else {
                controller.retire(id).await;
                controller.registry_mut().remove(id);
                report.deleted.push(id);
            }
        }

        if self.policy == ReconcilePolicy::Purge {
            if let Err(e) = controller.ledger().clear_all().await {
                warn!("Error clearing the ledger: {}", e);
            }
        }

        let mut lobbies: Vec<ChannelId> = controller.registry().lobbies().collect();
        lobbies.sort();
        for lobby in lobbies {
            for (guild_id, user_id) in snapshot.occupants_of(lobby) {
                let outcome = controller.join(guild_id, user_id, lobby).await;
                if let JoinOutcome::Created(room) = outcome {
                    report.created.push(room);
                }
            }
        }

        info!(
            "Reconciliation ({}) finished: {} restored, {} deleted, {} created",
            self.policy,
            report.restored.len(),
            report.deleted.len(),
            report.created.len()
        );
        report
    }
}
