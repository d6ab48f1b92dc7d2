//! Subcommand implementations
//!
//! Each command loads what it needs through [`ReportContext`], runs the
//! batch engine and prints the rendered result.

pub mod analyze;
pub mod cycles;
pub mod daily;
pub mod export;
pub mod summary;

use std::path::PathBuf;

use anyhow::{Context, Result};
use ecodan_common::config::TomlConfig;
use ecodan_common::normalize::{normalize, CanonicalStream};
use ecodan_common::rollup::HistoricalBaseline;
use ecodan_common::store::load_records;
use tracing::{debug, info, warn};

/// Resolved inputs shared by every subcommand
#[derive(Debug, Clone)]
pub struct ReportContext {
    pub config: TomlConfig,
    pub data_folder: PathBuf,
    pub log_file: PathBuf,
}

impl ReportContext {
    /// Load and normalise the record stream
    pub fn load_stream(&self) -> Result<CanonicalStream> {
        let loaded = load_records(&self.log_file)
            .with_context(|| format!("Failed to read record stream {}", self.log_file.display()))?;

        if loaded.skipped_rows > 0 {
            warn!("Skipped {} rows with unparseable timestamps", loaded.skipped_rows);
        }
        if !loaded.unknown_columns.is_empty() {
            debug!("Ignoring unknown columns: {}", loaded.unknown_columns.join(", "));
        }

        let raw = loaded.records.len();
        let stream = normalize(loaded.records);
        info!(
            "Loaded {} records ({} after de-duplication) from {}",
            raw,
            stream.len(),
            self.log_file.display()
        );
        Ok(stream)
    }

    pub fn baseline(&self) -> Result<HistoricalBaseline> {
        let path = self.config.historical_path(&self.data_folder);
        HistoricalBaseline::load(&path)
            .with_context(|| format!("Failed to read historical baseline {}", path.display()))
    }
}
