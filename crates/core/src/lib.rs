pub mod config;
pub mod directory;
pub mod error;
pub mod events;
pub mod ledger;
pub mod lifecycle;
pub mod model;
pub mod reconcile;
pub mod registry;
pub mod service;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use config::{Config, ConfigLoader, LedgerConfig};
pub use directory::{ChannelMetadata, RemoteDirectory, RoomRequest, UserProfile};
pub use error::{DomainError, InfraError, RemoteOp, VoxroomError};
pub use events::{GuildSnapshot, PresenceSnapshot, RoomEvent, VoicePresence, VoiceStateChange};
pub use ledger::{InMemoryLedger, Ledger};
pub use lifecycle::{ChangeOutcome, ControllerSettings, JoinOutcome, LeaveOutcome, LifecycleController};
pub use model::{ChannelId, EphemeralRoom, GuildId, LifecycleState, UserId};
pub use reconcile::{ReconcilePolicy, ReconcileReport, Reconciler};
pub use registry::RoomRegistry;
pub use service::RoomService;
