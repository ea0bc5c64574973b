//! voxroom Error Types
//!
//! This module defines a layered error hierarchy:
//! - `DomainError`: Business logic errors (config, unknown channel references)
//! - `InfraError`: Infrastructure errors (IO, YAML, remote directory, ledger)
//! - `VoxroomError`: Top-level error that wraps both categories
//!
//! None of these abort the event loop. The lifecycle controller logs them and
//! keeps going; they only bubble up to the caller during bootstrap.

use std::fmt;

/// Domain-level errors representing business logic failures
#[derive(Debug)]
pub enum DomainError {
    /// Configuration file not found at the specified path
    ConfigNotFound { path: String },
    /// Configuration validation failed
    ConfigInvalid { field: String, reason: String },
    /// Configuration parsing failed
    ConfigParse { source: String },
    /// An event or reconciliation step referenced a channel outside every expected set
    UnknownChannelReference { channel: String },
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigNotFound { path } => write!(f, "Config not found: {}", path),
            Self::ConfigInvalid { field, reason } => {
                write!(f, "Config invalid [{}]: {}", field, reason)
            }
            Self::ConfigParse { source } => write!(f, "Config parse error: {}", source),
            Self::UnknownChannelReference { channel } => {
                write!(f, "Unknown channel reference: {}", channel)
            }
        }
    }
}

impl std::error::Error for DomainError {}

/// Remote directory operations, used to label `RemoteCallFailed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteOp {
    CreateRoom,
    PlaceRoom,
    DeleteRoom,
    MoveUser,
    SetPermissions,
    GetChannel,
    GetUser,
}

impl RemoteOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateRoom => "create_room",
            Self::PlaceRoom => "place_room",
            Self::DeleteRoom => "delete_room",
            Self::MoveUser => "move_user",
            Self::SetPermissions => "set_owner_permissions",
            Self::GetChannel => "get_channel",
            Self::GetUser => "get_user",
        }
    }
}

impl fmt::Display for RemoteOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Infrastructure-level errors representing external system failures
#[derive(Debug)]
pub enum InfraError {
    /// IO operation failed
    Io(std::io::Error),
    /// YAML serialization/deserialization failed
    Yaml(serde_yml::Error),
    /// A remote directory call failed or timed out
    RemoteCallFailed { operation: RemoteOp, reason: String },
    /// The durable ledger could not be read or written
    LedgerIoFailed { operation: String, reason: String },
}

impl fmt::Display for InfraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "IO error: {}", err),
            Self::Yaml(err) => write!(f, "YAML error: {}", err),
            Self::RemoteCallFailed { operation, reason } => {
                write!(f, "Remote call {} failed: {}", operation, reason)
            }
            Self::LedgerIoFailed { operation, reason } => {
                write!(f, "Ledger {} failed: {}", operation, reason)
            }
        }
    }
}

impl std::error::Error for InfraError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Yaml(e) => Some(e),
            Self::RemoteCallFailed { .. } | Self::LedgerIoFailed { .. } => None,
        }
    }
}

impl From<std::io::Error> for InfraError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_yml::Error> for InfraError {
    fn from(err: serde_yml::Error) -> Self {
        Self::Yaml(err)
    }
}

/// Top-level error type for voxroom
#[derive(Debug)]
pub enum VoxroomError {
    /// Business logic error
    Domain(DomainError),
    /// Infrastructure/external system error
    Infra(InfraError),
    /// Generic error for edge cases
    Other(String),
}

impl fmt::Display for VoxroomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Domain(e) => write!(f, "{}", e),
            Self::Infra(e) => write!(f, "{}", e),
            Self::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for VoxroomError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Domain(e) => Some(e),
            Self::Infra(e) => Some(e),
            Self::Other(_) => None,
        }
    }
}

impl From<DomainError> for VoxroomError {
    fn from(err: DomainError) -> Self {
        Self::Domain(err)
    }
}

impl From<InfraError> for VoxroomError {
    fn from(err: InfraError) -> Self {
        Self::Infra(err)
    }
}

// Convenience conversions from infrastructure error sources
impl From<std::io::Error> for VoxroomError {
    fn from(err: std::io::Error) -> Self {
        Self::Infra(InfraError::Io(err))
    }
}

impl From<serde_yml::Error> for VoxroomError {
    fn from(err: serde_yml::Error) -> Self {
        Self::Infra(InfraError::Yaml(err))
    }
}

impl VoxroomError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::Domain(DomainError::ConfigNotFound { path: path.into() })
    }

    pub fn config_parse_error(source: impl Into<String>) -> Self {
        Self::Domain(DomainError::ConfigParse {
            source: source.into(),
        })
    }

    pub fn config_invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Domain(DomainError::ConfigInvalid {
            field: field.into(),
            reason: reason.into(),
        })
    }

    pub fn unknown_channel(channel: impl fmt::Display) -> Self {
        Self::Domain(DomainError::UnknownChannelReference {
            channel: channel.to_string(),
        })
    }

    pub fn remote(operation: RemoteOp, reason: impl Into<String>) -> Self {
        Self::Infra(InfraError::RemoteCallFailed {
            operation,
            reason: reason.into(),
        })
    }

    pub fn ledger(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Infra(InfraError::LedgerIoFailed {
            operation: operation.into(),
            reason: reason.into(),
        })
    }

    /// True for failures of the remote directory (create, delete, move, ...)
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Infra(InfraError::RemoteCallFailed { .. }))
    }

    /// True for failures of the durable ledger
    pub fn is_ledger(&self) -> bool {
        matches!(self, Self::Infra(InfraError::LedgerIoFailed { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_error_names_the_operation() {
        let err = VoxroomError::remote(RemoteOp::DeleteRoom, "404 Unknown Channel");
        assert!(err.is_remote());
        assert!(!err.is_ledger());
        assert_eq!(
            err.to_string(),
            "Remote call delete_room failed: 404 Unknown Channel"
        );
    }

    #[test]
    fn ledger_error_display() {
        let err = VoxroomError::ledger("add", "database is locked");
        assert!(err.is_ledger());
        assert_eq!(err.to_string(), "Ledger add failed: database is locked");
    }

    #[test]
    fn unknown_channel_is_a_domain_error() {
        let err = VoxroomError::unknown_channel(42u64);
        assert!(matches!(
            err,
            VoxroomError::Domain(DomainError::UnknownChannelReference { ref channel }) if channel == "42"
        ));
    }
}
