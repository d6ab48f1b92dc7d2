//! Ecodan Logger (ecodan-logger) - Main entry point
//!
//! Subscribes to the heat pump controller's event stream, keeps the latest
//! value of every channel and appends one record per flush interval to the
//! CSV record stream in the data folder.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use ecodan_common::collector::{self, FlushSchedule, LiveCollector};
use ecodan_common::config::TomlConfig;
use ecodan_common::store::CsvRecordStore;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod room_temp;
mod sse;

use room_temp::HomeAssistantRoomTemp;
use sse::EventStreamClient;

/// Command-line arguments for ecodan-logger
#[derive(Parser, Debug)]
#[command(name = "ecodan-logger")]
#[command(about = "Live telemetry logger for the Ecodan heat pump")]
#[command(version)]
struct Args {
    /// TOML config file
    #[arg(short, long, env = "ECODAN_CONFIG")]
    config: Option<PathBuf>,

    /// Folder holding the record stream
    #[arg(short, long, env = "ECODAN_DATA_FOLDER")]
    data_folder: Option<PathBuf>,

    /// Controller event stream URL (overrides the config file)
    #[arg(long)]
    events_url: Option<String>,

    /// List the controller's entity ids once and exit
    #[arg(long)]
    discover: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = TomlConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    // Initialize tracing; RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("ecodan_logger={0},ecodan_common={0}", config.logging.level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting Ecodan Logger v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let events_url = args
        .events_url
        .clone()
        .unwrap_or_else(|| config.source.events_url.clone());
    let client = EventStreamClient::new(events_url).context("Failed to create event stream client")?;

    if args.discover {
        println!("Connecting to {} to discover entity IDs...\n", client.url());
        match client.discover().await {
            Ok(report) => {
                println!(
                    "\nFound {} entities ({} unknown)",
                    report.entities, report.unknown
                );
                let missing = report.missing_required();
                if !missing.is_empty() {
                    println!("Required channels not seen:");
                    for channel in missing {
                        println!("  {}", channel);
                    }
                }
            }
            Err(e) => println!("Connection ended: {}", e),
        }
        return Ok(());
    }

    let data_folder = config.resolve_data_folder(args.data_folder.as_deref());
    std::fs::create_dir_all(&data_folder)
        .with_context(|| format!("Failed to create data folder {}", data_folder.display()))?;
    let log_path = config.log_path(&data_folder);

    let (store, _) = CsvRecordStore::open(&log_path)
        .with_context(|| format!("Failed to open record stream {}", log_path.display()))?;

    let room_temp = HomeAssistantRoomTemp::from_config(&config.auxiliary)
        .context("Failed to initialize room temperature source")?;

    // Entities are queried one after another, each with its own timeout
    let auxiliary_timeout = room_temp
        .as_ref()
        .map_or(Duration::ZERO, |s| config.auxiliary.timeout() * s.entity_count() as u32)
        + Duration::from_secs(1);

    let schedule = FlushSchedule {
        interval: config.collector.flush_interval(),
        auxiliary_timeout,
    };
    info!(
        "Listening on {}, flushing every {}s",
        client.url(),
        schedule.interval.as_secs()
    );

    let live = Arc::new(LiveCollector::new());
    let handle = collector::start(Arc::clone(&live), store, room_temp, schedule);

    let stream_cancel = CancellationToken::new();
    let stream_task = tokio::spawn(sse::run_with_reconnect(
        client,
        Arc::clone(&live),
        config.source.reconnect_delay(),
        stream_cancel.clone(),
    ));

    shutdown_signal().await;

    stream_cancel.cancel();
    if let Err(e) = stream_task.await {
        error!("Event stream task failed: {}", e);
    }
    let store = handle.stop().await.context("Failed to stop collector")?;

    info!(
        "Stopped after {} updates; records in {}",
        live.update_count(),
        store.path().display()
    );
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
