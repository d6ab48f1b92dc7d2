//! Ecodan Report (ecodan-report) - Main entry point
//!
//! Batch analysis over the record stream written by ecodan-logger: daily
//! tables, monthly and yearly rollups with the historical baseline, state
//! cycles, period analysis and a daily CSV export.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};
use ecodan_common::config::TomlConfig;
use ecodan_common::time::parse_instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod export;
mod render;

use commands::ReportContext;

/// Command-line arguments for ecodan-report
#[derive(Parser, Debug)]
#[command(name = "ecodan-report")]
#[command(about = "Energy and cycle reports from the Ecodan record stream")]
#[command(version)]
struct Cli {
    /// TOML config file
    #[arg(short, long, global = true, env = "ECODAN_CONFIG")]
    config: Option<PathBuf>,

    /// Folder holding the record stream and historical baseline
    #[arg(short, long, global = true, env = "ECODAN_DATA_FOLDER")]
    data_folder: Option<PathBuf>,

    /// Record stream to read (default: the configured file in the data folder)
    #[arg(short, long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Per-day energy, efficiency and duty table
    Daily,

    /// Monthly and yearly totals including the historical baseline
    Summary,

    /// State segments of one binary channel
    Cycles {
        /// Channel column name, e.g. compressor_on, defrost, 3way_valve_dhw
        #[arg(long, default_value = "compressor_on")]
        channel: String,

        /// Only list active segments
        #[arg(long)]
        active_only: bool,
    },

    /// Diagnostic statistics over the whole log or a time range
    Analyze {
        /// Start of the range, inclusive ("YYYY-MM-DD[ HH:MM[:SS]]")
        #[arg(long, value_parser = parse_instant_arg)]
        from: Option<NaiveDateTime>,

        /// End of the range, exclusive
        #[arg(long, value_parser = parse_instant_arg)]
        to: Option<NaiveDateTime>,
    },

    /// Analyse the periods before and after an instant
    Compare {
        /// Split instant; readings at or after it count as "after"
        #[arg(long, value_parser = parse_instant_arg)]
        split: NaiveDateTime,
    },

    /// Write daily summaries to a CSV file
    Export {
        /// Output path (default: daily_energy.csv in the data folder)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn parse_instant_arg(raw: &str) -> std::result::Result<NaiveDateTime, String> {
    parse_instant(raw).map_err(|e| e.to_string())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = TomlConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    // Diagnostics go to stderr so report output can be piped
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("ecodan_report={0},ecodan_common={0}", config.logging.level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let data_folder = config.resolve_data_folder(cli.data_folder.as_deref());
    let log_file = cli
        .log_file
        .clone()
        .unwrap_or_else(|| config.log_path(&data_folder));
    let ctx = ReportContext {
        config,
        data_folder,
        log_file,
    };

    match cli.command {
        Commands::Daily => commands::daily::run(&ctx),
        Commands::Summary => commands::summary::run(&ctx),
        Commands::Cycles { channel, active_only } => commands::cycles::run(&ctx, &channel, active_only),
        Commands::Analyze { from, to } => commands::analyze::run(&ctx, from, to),
        Commands::Compare { split } => commands::analyze::run_compare(&ctx, split),
        Commands::Export { output } => commands::export::run(&ctx, output.as_deref()),
    }
}
