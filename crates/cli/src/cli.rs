use clap::{Parser, Subcommand};
use std::path::PathBuf;
use voxroom_core::config::TOKEN_ENV;
use voxroom_core::{ChannelId, ReconcilePolicy};

#[derive(Parser, Debug)]
#[command(name = "voxroom", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Config file path (YAML)
    #[arg(long = "config", value_name = "FILE", global = true)]
    pub config_path: Option<PathBuf>,

    /// Bot token
    #[arg(short, long, env = TOKEN_ENV, hide_env_values = true, global = true)]
    pub token: Option<String>,

    /// Lobby channel IDs, space separated
    #[arg(
        short = 'c',
        long = "channels",
        value_name = "IDS",
        num_args = 1..,
        value_delimiter = ' ',
        global = true
    )]
    pub lobbies: Vec<ChannelId>,

    /// Room name pattern; `%s` is replaced by the owner's name
    #[arg(long = "room-pattern", visible_alias = "rp", global = true)]
    pub room_pattern: Option<String>,

    /// Ledger database file
    #[arg(long = "db", value_name = "FILE", global = true)]
    pub db_path: Option<PathBuf>,

    /// Keep track of rooms in memory only
    #[arg(long, global = true)]
    pub no_ledger: bool,

    /// What to do with rooms left over from a previous run
    #[arg(long, value_name = "reconcile|purge", global = true)]
    pub policy: Option<ReconcilePolicy>,

    /// "Playing ..." status shown on the bot
    #[arg(long, global = true)]
    pub status: Option<String>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Connect and manage rooms (default)
    Run,

    /// Generate sample configuration
    ConfigSample {
        /// Output path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Inspect or reset the room ledger
    Ledger {
        #[command(subcommand)]
        command: LedgerCommands,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum LedgerCommands {
    /// List tracked room IDs
    List {
        #[arg(long)]
        json: bool,
    },
    /// Forget every tracked room (channels are not deleted)
    Clear,
}
