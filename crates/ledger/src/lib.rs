//! voxroom_ledger
//! SQLite-backed ledger of the rooms this process owns.
//!
//! The schema is a single set-like table, `channels(channelID TEXT PRIMARY
//! KEY)`. No occupancy or metadata is stored; the ledger exists only so a
//! restarted process can find the rooms it created.

use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, warn};
use voxroom_core::{ChannelId, Ledger, VoxroomError};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS channels (channelID TEXT PRIMARY KEY)";

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("connection lock poisoned")]
    Poisoned,
    #[error("blocking task failed: {0}")]
    Task(String),
}

/// Durable ledger stored in a SQLite file
#[derive(Clone)]
pub struct SqliteLedger {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl SqliteLedger {
    /// Open (or create) the ledger database at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        debug!("Ledger opened at {:?}", path);
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(path.to_path_buf()),
        })
    }

    /// Throwaway ledger, mostly for tests
    pub fn open_in_memory() -> Result<Self, LedgerError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: None,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Run `f` against the connection on the blocking pool
    async fn with_conn<T, F>(&self, f: F) -> Result<T, LedgerError>
    where
        F: FnOnce(&Connection) -> Result<T, LedgerError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().map_err(|_| LedgerError::Poisoned)?;
            f(&guard)
        })
        .await
        .map_err(|e| LedgerError::Task(e.to_string()))?
    }
}

fn read_ids(conn: &Connection) -> Result<Vec<ChannelId>, LedgerError> {
    let mut stmt = conn.prepare("SELECT channelID FROM channels ORDER BY channelID")?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

    let mut ids = Vec::new();
    for row in rows {
        let raw = row?;
        match raw.parse::<ChannelId>() {
            Ok(id) => ids.push(id),
            Err(e) => warn!("Skipping unreadable ledger row: {}", e),
        }
    }
    Ok(ids)
}

fn ledger_error(operation: &'static str) -> impl FnOnce(LedgerError) -> VoxroomError {
    move |e| VoxroomError::ledger(operation, e.to_string())
}

#[async_trait]
impl Ledger for SqliteLedger {
    async fn add(&self, id: ChannelId) -> Result<(), VoxroomError> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO channels (channelID) VALUES (?1)",
                params![id.to_string()],
            )?;
            Ok(())
        })
        .await
        .map_err(ledger_error("add"))
    }

    async fn remove(&self, id: ChannelId) -> Result<(), VoxroomError> {
        self.with_conn(move |conn| {
            conn.execute(
                "DELETE FROM channels WHERE channelID = ?1",
                params![id.to_string()],
            )?;
            Ok(())
        })
        .await
        .map_err(ledger_error("remove"))
    }

    async fn list_all(&self) -> Result<Vec<ChannelId>, VoxroomError> {
        self.with_conn(read_ids)
            .await
            .map_err(ledger_error("list_all"))
    }

    async fn clear_all(&self) -> Result<(), VoxroomError> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM channels", [])?;
            Ok(())
        })
        .await
        .map_err(ledger_error("clear_all"))
    }
}
