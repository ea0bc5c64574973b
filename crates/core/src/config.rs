//! voxroom Configuration
//!
//! YAML configuration with serde defaults. Every field can also be supplied on
//! the command line; flags win over the file.

use crate::error::VoxroomError;
use crate::lifecycle::{ControllerSettings, DEFAULT_ROOM_PATTERN};
use crate::model::ChannelId;
use crate::reconcile::ReconcilePolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// ============================================================================
// Constants
// ============================================================================

/// Default ledger database file, relative to the working directory
pub const DEFAULT_DB_PATH: &str = "./store.db";
/// Default timeout for a single remote call (seconds)
pub const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 10;
/// Environment variable holding the bot token
pub const TOKEN_ENV: &str = "DISCORD_BOT_TOKEN";

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

// ============================================================================
// Main Config
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Bot token; usually taken from the environment instead
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Channels that spawn a room when joined
    #[serde(default)]
    pub lobbies: Vec<ChannelId>,
    /// Room name pattern with exactly one `%s`
    #[serde(default = "Config::default_room_pattern")]
    pub room_pattern: String,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub reconcile_policy: ReconcilePolicy,
    #[serde(default = "Config::default_remote_timeout_secs")]
    pub remote_timeout_secs: u64,
    /// "Playing ..." status shown on the bot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity: Option<String>,
}

impl Config {
    fn default_room_pattern() -> String {
        DEFAULT_ROOM_PATTERN.to_string()
    }
    fn default_remote_timeout_secs() -> u64 {
        DEFAULT_REMOTE_TIMEOUT_SECS
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            token: None,
            lobbies: Vec::new(),
            room_pattern: DEFAULT_ROOM_PATTERN.to_string(),
            ledger: LedgerConfig::default(),
            reconcile_policy: ReconcilePolicy::default(),
            remote_timeout_secs: DEFAULT_REMOTE_TIMEOUT_SECS,
            activity: None,
        }
    }
}

/// Durable ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// When off, rooms are only tracked in memory and a restart forgets them
    #[serde(default = "LedgerConfig::default_enabled")]
    pub enabled: bool,
    #[serde(default = "LedgerConfig::default_db_path")]
    pub db_path: PathBuf,
}

impl LedgerConfig {
    fn default_enabled() -> bool {
        true
    }
    fn default_db_path() -> PathBuf {
        PathBuf::from(DEFAULT_DB_PATH)
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            db_path: Self::default_db_path(),
        }
    }
}

// ============================================================================
// Loading
// ============================================================================

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from `path`, or from the first default location that exists.
    ///
    /// With no explicit path and no file at any default location, the
    /// built-in defaults are returned.
    pub fn load(path: Option<&Path>) -> Result<Config, VoxroomError> {
        let config_path = match path {
            Some(p) => {
                if !p.exists() {
                    return Err(VoxroomError::config_not_found(p.display().to_string()));
                }
                p.to_path_buf()
            }
            None => match Self::default_paths().into_iter().find(|p| p.exists()) {
                Some(p) => p,
                None => return Ok(Config::default()),
            },
        };

        tracing::debug!("Loading config from {:?}", config_path);
        let content = std::fs::read_to_string(&config_path)
            .map_err(|e| VoxroomError::config_parse_error(format!("Failed to read: {}", e)))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Config, VoxroomError> {
        serde_yml::from_str(content)
            .map_err(|e| VoxroomError::config_parse_error(format!("Failed to parse: {}", e)))
    }

    fn default_paths() -> Vec<PathBuf> {
        vec![
            home_dir().join(".voxroom/config.yaml"),
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("voxroom.yaml"),
            PathBuf::from("./voxroom.yaml"),
        ]
    }

    /// Validate everything the room service needs to start
    pub fn validate(config: &Config) -> Result<(), VoxroomError> {
        if config.lobbies.is_empty() {
            return Err(VoxroomError::config_invalid(
                "lobbies",
                "At least one lobby channel is required",
            ));
        }

        let placeholders = config.room_pattern.matches("%s").count();
        if placeholders != 1 {
            return Err(VoxroomError::config_invalid(
                "room_pattern",
                format!(
                    "Pattern '{}' must contain exactly one '%s', found {}",
                    config.room_pattern, placeholders
                ),
            ));
        }

        if config.remote_timeout_secs == 0 {
            return Err(VoxroomError::config_invalid(
                "remote_timeout_secs",
                "Timeout must be at least one second",
            ));
        }

        match config.token.as_deref() {
            Some(token) if !token.trim().is_empty() => Ok(()),
            _ => Err(VoxroomError::config_invalid(
                "token",
                format!("Bot token missing; pass --token or set {}", TOKEN_ENV),
            )),
        }
    }
}

impl Config {
    pub fn save(&self, path: &Path) -> Result<(), VoxroomError> {
        let content = serde_yml::to_string(self).map_err(|e| {
            VoxroomError::config_parse_error(format!("Serialization failed: {}", e))
        })?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Generate a sample configuration
    pub fn sample() -> Self {
        Config {
            token: None,
            lobbies: ChannelId::new(123456789012345678).into_iter().collect(),
            room_pattern: DEFAULT_ROOM_PATTERN.to_string(),
            ledger: LedgerConfig::default(),
            reconcile_policy: ReconcilePolicy::Reconcile,
            remote_timeout_secs: DEFAULT_REMOTE_TIMEOUT_SECS,
            activity: Some("Garry's Mod".to_string()),
        }
    }

    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            room_pattern: self.room_pattern.clone(),
            remote_timeout: Duration::from_secs(self.remote_timeout_secs),
        }
    }
}
