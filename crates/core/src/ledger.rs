//! Ledger Store contract
//!
//! The ledger is the durable record of room IDs this process believes it owns.
//! It is only consulted at startup to discover candidates; occupancy is never
//! persisted.

use crate::error::VoxroomError;
use crate::model::ChannelId;
use async_trait::async_trait;
use std::collections::BTreeSet;
use tokio::sync::Mutex;

#[async_trait]
pub trait Ledger: Send + Sync {
    /// Record a room. Adding an existing ID is a no-op.
    async fn add(&self, id: ChannelId) -> Result<(), VoxroomError>;

    /// Forget a room. Removing an absent ID is a no-op.
    async fn remove(&self, id: ChannelId) -> Result<(), VoxroomError>;

    async fn list_all(&self) -> Result<Vec<ChannelId>, VoxroomError>;

    async fn clear_all(&self) -> Result<(), VoxroomError>;
}

/// Non-durable ledger, used when persistence is disabled
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    ids: Mutex<BTreeSet<ChannelId>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ids(ids: impl IntoIterator<Item = ChannelId>) -> Self {
        Self {
            ids: Mutex::new(ids.into_iter().collect()),
        }
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn add(&self, id: ChannelId) -> Result<(), VoxroomError> {
        self.ids.lock().await.insert(id);
        Ok(())
    }

    async fn remove(&self, id: ChannelId) -> Result<(), VoxroomError> {
        self.ids.lock().await.remove(&id);
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<ChannelId>, VoxroomError> {
        Ok(self.ids.lock().await.iter().copied().collect())
    }

    async fn clear_all(&self) -> Result<(), VoxroomError> {
        self.ids.lock().await.clear();
        Ok(())
    }
}
