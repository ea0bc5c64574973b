mod cli;

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::cli::{Cli, Commands, LedgerCommands};
use voxroom_channels::{DiscordConfig, DiscordDirectory, DiscordGateway};
use voxroom_core::{
    Config, ConfigLoader, InMemoryLedger, Ledger, LifecycleController, Reconciler, RoomRegistry,
    RoomService,
};
use voxroom_ledger::SqliteLedger;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("voxroom=info,warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    // Handle ConfigSample immediately without loading config
    if let Some(Commands::ConfigSample { output }) = &cli.command {
        let path = output
            .clone()
            .unwrap_or_else(|| PathBuf::from("./voxroom.sample.yaml"));
        Config::sample().save(&path)?;
        println!("✅ Sample config written to {:?}", path);
        return Ok(());
    }

    let config = resolve_config(&cli)?;

    match cli.command {
        Some(Commands::Ledger { command }) => handle_ledger(&config, command).await,
        Some(Commands::ConfigSample { .. }) => Ok(()),
        Some(Commands::Run) | None => run(config).await,
    }
}

/// Config file (explicit or default location) with command-line flags on top
fn resolve_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = ConfigLoader::load(cli.config_path.as_deref())?;

    if cli.token.is_some() {
        config.token = cli.token.clone();
    }
    if !cli.lobbies.is_empty() {
        config.lobbies = cli.lobbies.clone();
    }
    if let Some(pattern) = &cli.room_pattern {
        config.room_pattern = pattern.clone();
    }
    if let Some(db_path) = &cli.db_path {
        config.ledger.db_path = db_path.clone();
    }
    if cli.no_ledger {
        config.ledger.enabled = false;
    }
    if let Some(policy) = cli.policy {
        config.reconcile_policy = policy;
    }
    if cli.status.is_some() {
        config.activity = cli.status.clone();
    }
    Ok(config)
}

fn open_ledger(config: &Config) -> anyhow::Result<Arc<dyn Ledger>> {
    if !config.ledger.enabled {
        warn!("Ledger disabled; rooms left behind by a restart will not be cleaned up");
        return Ok(Arc::new(InMemoryLedger::new()));
    }
    let ledger = SqliteLedger::open(&config.ledger.db_path).with_context(|| {
        format!(
            "Failed to open ledger at {}",
            config.ledger.db_path.display()
        )
    })?;
    info!("Ledger: {}", config.ledger.db_path.display());
    Ok(Arc::new(ledger))
}

async fn run(config: Config) -> anyhow::Result<()> {
    ConfigLoader::validate(&config)?;
    let token = config.token.clone().unwrap_or_default();

    info!(
        "Starting voxroom v{} with {} lobbies, pattern '{}', policy {}",
        env!("CARGO_PKG_VERSION"),
        config.lobbies.len(),
        config.room_pattern,
        config.reconcile_policy
    );

    let ledger = open_ledger(&config)?;
    let directory = Arc::new(DiscordDirectory::new(token.clone()));
    let controller = LifecycleController::new(
        RoomRegistry::new(config.lobbies.iter().copied()),
        directory,
        ledger,
        config.controller_settings(),
    );
    let service = RoomService::new(controller, Reconciler::new(config.reconcile_policy));

    let (events_tx, events_rx) = RoomService::channel();
    let worker = tokio::spawn(service.run(events_rx));

    let gateway = DiscordGateway::new(
        DiscordConfig::new(token).with_activity(config.activity.clone()),
        events_tx,
    );
    let gateway_result = gateway.run(shutdown_signal()).await;

    // The gateway owned the only sender, so the service drains and stops.
    let service = worker.await.context("Room service task failed")?;
    info!(
        "Stopped; {} rooms still tracked",
        service.controller().registry().len()
    );

    gateway_result?;
    Ok(())
}

async fn handle_ledger(config: &Config, command: LedgerCommands) -> anyhow::Result<()> {
    if !config.ledger.enabled {
        anyhow::bail!("Ledger is disabled (--no-ledger); nothing to inspect");
    }
    let ledger = SqliteLedger::open(&config.ledger.db_path).with_context(|| {
        format!(
            "Failed to open ledger at {}",
            config.ledger.db_path.display()
        )
    })?;

    match command {
        LedgerCommands::List { json } => {
            let ids = ledger.list_all().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&ids)?);
            } else if ids.is_empty() {
                println!("No rooms tracked in {}", config.ledger.db_path.display());
            } else {
                println!("📝 Tracked rooms:");
                for id in ids {
                    println!("  • {}", id);
                }
            }
        }
        LedgerCommands::Clear => {
            let count = ledger.list_all().await?.len();
            ledger.clear_all().await?;
            println!("✅ Forgot {} rooms", count);
        }
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
