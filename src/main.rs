// ABOUTME: Main entry point for the warden moderation bot with sync loop
// ABOUTME: Parses the CLI, initializes logging and config, then runs the bot or an offline strikes command

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use matrix_sdk::config::SyncSettings;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use warden::{
    event_pump, logging, matrix_client, platform::MatrixTransport, strikes, Config,
    EventDispatcher, InfractionStore,
};
use warden_core::{InviteEvent, RoomTransport};

/// Pause before resuming a sync that failed
const SYNC_RETRY_DELAY: Duration = Duration::from_secs(15);

#[derive(Parser)]
#[command(name = "warden")]
#[command(about = "Matrix bot that keeps group rooms thread-only")]
#[command(version)]
struct Cli {
    /// Path to config.toml (overrides WARDEN_CONFIG_PATH)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to the homeserver and start moderating (default)
    Run,
    /// Inspect or reset infraction counts
    Strikes {
        #[command(subcommand)]
        action: StrikesAction,
    },
}

#[derive(Subcommand)]
enum StrikesAction {
    /// Show the count for one user in one room
    Show { user_id: String, room_id: String },
    /// List every user with strikes in a room
    List { room_id: String },
    /// Reset a user's count in a room
    Clear { user_id: String, room_id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Set up panic hook to log panics before they crash the process
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("\n╔══════════════════════════════════════════════════════════╗");
        eprintln!("║ PANIC! Bot crashed with the following error:            ║");
        eprintln!("╚══════════════════════════════════════════════════════════╝\n");
        eprintln!("{}", panic_info);
        eprintln!("\nBacktrace:");
        eprintln!("{:?}", std::backtrace::Backtrace::force_capture());
    }));

    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref())?;
    let _log_guard = logging::init(&config.logging)?;
    match &config.source {
        Some(path) => tracing::info!(path = %path.display(), "Loaded configuration from file"),
        None => tracing::info!("No config file found, using environment variables and defaults"),
    }

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_bot(config).await,
        Commands::Strikes { action } => {
            let store = InfractionStore::open(&config.storage.database)?;
            let output = match action {
                StrikesAction::Show { user_id, room_id } => {
                    strikes::show(&store, &user_id, &room_id)?
                }
                StrikesAction::List { room_id } => strikes::list(&store, &room_id)?,
                StrikesAction::Clear { user_id, room_id } => {
                    strikes::clear(&store, &user_id, &room_id)?
                }
            };
            println!("{}", output);
            Ok(())
        }
    }
}

async fn run_bot(config: Config) -> Result<()> {
    config.validate_matrix()?;

    tracing::info!(
        homeserver = %config.matrix.home_server,
        user_id = %config.matrix.user_id,
        prefix = %config.bot.command_prefix,
        threshold = config.moderation.threshold,
        database = %config.storage.database,
        "Configuration loaded"
    );

    if let Some(addr) = config.metrics.listen {
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("Failed to install Prometheus exporter")?;
        tracing::info!(%addr, "Metrics endpoint listening");
    }

    let store = InfractionStore::open(&config.storage.database)?;

    let client = matrix_client::create_client(
        &config.matrix.home_server,
        &config.matrix.user_id,
        &config.matrix.device_name,
    )
    .await?;

    matrix_client::login(
        &client,
        &config.matrix.user_id,
        config.matrix.password.as_deref(),
        config.matrix.access_token.as_deref(),
        &config.matrix.device_name,
    )
    .await?;

    // Catch up before any handler is registered so history is not moderated
    tracing::info!("Performing initial sync to set up encryption...");
    let response = client
        .sync_once(SyncSettings::default())
        .await
        .context("Initial sync failed")?;
    tracing::info!("Initial sync complete");

    let transport = Arc::new(MatrixTransport::new(client.clone())?);
    let dispatcher = Arc::new(EventDispatcher::new(transport.clone(), store, &config)?);

    // Invites that arrived while offline are only visible in the initial snapshot
    for room in client.invited_rooms() {
        dispatcher
            .on_invite_event(InviteEvent {
                room_id: room.room_id().to_string(),
                sender: String::new(),
                invitee: transport.bot_user_id().to_string(),
            })
            .await;
    }

    let rx = transport.setup_event_stream();
    let pump = tokio::spawn(event_pump::run(Arc::clone(&dispatcher), rx));
    tracing::info!("Event handlers registered, starting continuous sync");

    let sync_client = client.clone();
    let mut settings = SyncSettings::default().token(response.next_batch);
    let sync = async move {
        loop {
            match sync_client.sync(settings.clone()).await {
                Ok(()) => return,
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        retry_in_secs = SYNC_RETRY_DELAY.as_secs(),
                        "Sync failed"
                    );
                    warden_core::metrics::record_sync_restart();
                    tokio::time::sleep(SYNC_RETRY_DELAY).await;
                    // The store remembers where the last successful sync stopped
                    settings = SyncSettings::default();
                }
            }
        }
    };

    tokio::select! {
        _ = sync => tracing::warn!("Sync loop ended"),
        _ = tokio::signal::ctrl_c() => tracing::info!("Shutting down"),
    }

    pump.abort();
    Ok(())
}
