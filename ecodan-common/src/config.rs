//! Configuration loading and data folder resolution
//!
//! Both binaries read the same TOML bootstrap file. Every field has a
//! compiled default, so a missing file only produces a warning.
//!
//! # Resolution order
//!
//! Config file:
//! 1. `--config <path>` command-line argument
//! 2. `ECODAN_CONFIG` environment variable
//! 3. `~/.config/ecodan/config.toml`, then `/etc/ecodan/config.toml`
//! 4. compiled defaults
//!
//! Data folder:
//! 1. `--data-folder` command-line argument
//! 2. `ECODAN_DATA_FOLDER` environment variable
//! 3. `data_folder` in the TOML file
//! 4. OS-dependent default (`~/.local/share/ecodan` on Linux)

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::{Error, Result};

pub const CONFIG_ENV_VAR: &str = "ECODAN_CONFIG";
pub const DATA_FOLDER_ENV_VAR: &str = "ECODAN_DATA_FOLDER";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// Folder holding the record stream and the historical baseline
    #[serde(default)]
    pub data_folder: Option<PathBuf>,

    /// Record stream file name inside the data folder
    #[serde(default = "default_log_file_name")]
    pub log_file_name: String,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub collector: CollectorConfig,

    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub auxiliary: AuxiliaryConfig,

    #[serde(default)]
    pub report: ReportConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Live collector cadence
#[derive(Debug, Clone, Deserialize)]
pub struct CollectorConfig {
    /// Seconds between flushed records
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,
}

/// Controller event stream
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// ESPHome server-sent-events endpoint
    #[serde(default = "default_events_url")]
    pub events_url: String,

    /// Wait before reconnecting after a dropped stream
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,
}

/// Home Assistant room temperature source
#[derive(Debug, Clone, Deserialize)]
pub struct AuxiliaryConfig {
    #[serde(default = "default_ha_base_url")]
    pub base_url: String,

    /// File containing a long-lived access token. No token disables the source.
    #[serde(default)]
    pub token_file: Option<PathBuf>,

    /// Climate entities whose current temperature is averaged
    #[serde(default = "default_entities")]
    pub entities: Vec<String>,

    /// Multiplier applied to each reported temperature
    ///
    /// Default 0.5: the Tuya thermostats report twice the actual value.
    #[serde(default = "default_scale")]
    pub scale: f64,

    /// Per-request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Report CLI settings
#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    /// Historical monthly baseline, relative to the data folder unless absolute
    #[serde(default = "default_historical_file")]
    pub historical_file: PathBuf,
}

fn default_log_file_name() -> String {
    "ecodan_log.csv".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_flush_interval_secs() -> u64 {
    60
}

fn default_events_url() -> String {
    "http://192.168.1.230/events".to_string()
}

fn default_reconnect_delay_secs() -> u64 {
    10
}

fn default_ha_base_url() -> String {
    "http://127.0.0.1:8123".to_string()
}

fn default_entities() -> Vec<String> {
    vec![
        "climate.dnevna_soba".to_string(),
        "climate.ured".to_string(),
        "climate.kupatilo".to_string(),
    ]
}

fn default_scale() -> f64 {
    0.5
}

fn default_timeout_secs() -> u64 {
    5
}

fn default_historical_file() -> PathBuf {
    PathBuf::from("historical_energy.json")
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            flush_interval_secs: default_flush_interval_secs(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            events_url: default_events_url(),
            reconnect_delay_secs: default_reconnect_delay_secs(),
        }
    }
}

impl Default for AuxiliaryConfig {
    fn default() -> Self {
        Self {
            base_url: default_ha_base_url(),
            token_file: None,
            entities: default_entities(),
            scale: default_scale(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            historical_file: default_historical_file(),
        }
    }
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            data_folder: None,
            log_file_name: default_log_file_name(),
            logging: LoggingConfig::default(),
            collector: CollectorConfig::default(),
            source: SourceConfig::default(),
            auxiliary: AuxiliaryConfig::default(),
            report: ReportConfig::default(),
        }
    }
}

impl CollectorConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs.max(1))
    }
}

impl SourceConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }
}

impl AuxiliaryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl TomlConfig {
    /// Parse a config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve and load the config file, falling back to defaults
    ///
    /// An explicitly named file (CLI or environment) that cannot be read is
    /// an error. A missing default-location file is not.
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = cli_path {
            return Self::from_file(path);
        }
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            return Self::from_file(Path::new(&path));
        }
        match default_config_path() {
            Some(path) => {
                debug!("Loading config from {}", path.display());
                Self::from_file(&path)
            }
            None => {
                warn!("No config file found, using compiled defaults");
                Ok(Self::default())
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.log_file_name.trim().is_empty() {
            return Err(Error::Config("log_file_name must not be empty".to_string()));
        }
        if self.collector.flush_interval_secs == 0 {
            return Err(Error::Config(
                "collector.flush_interval_secs must be positive".to_string(),
            ));
        }
        if !self.auxiliary.scale.is_finite() || self.auxiliary.scale <= 0.0 {
            return Err(Error::Config("auxiliary.scale must be positive".to_string()));
        }
        Ok(())
    }

    /// Data folder per the documented priority order
    pub fn resolve_data_folder(&self, cli_arg: Option<&Path>) -> PathBuf {
        if let Some(path) = cli_arg {
            return path.to_path_buf();
        }
        if let Ok(path) = std::env::var(DATA_FOLDER_ENV_VAR) {
            return PathBuf::from(path);
        }
        if let Some(path) = &self.data_folder {
            return path.clone();
        }
        default_data_folder()
    }

    /// Record stream path inside a resolved data folder
    pub fn log_path(&self, data_folder: &Path) -> PathBuf {
        data_folder.join(&self.log_file_name)
    }

    pub fn historical_path(&self, data_folder: &Path) -> PathBuf {
        if self.report.historical_file.is_absolute() {
            self.report.historical_file.clone()
        } else {
            data_folder.join(&self.report.historical_file)
        }
    }
}

/// First existing config file among the per-user and system locations
fn default_config_path() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("ecodan").join("config.toml"));
    let system_config = PathBuf::from("/etc/ecodan/config.toml");

    user_config
        .into_iter()
        .chain(std::iter::once(system_config))
        .find(|p| p.exists())
}

/// OS-dependent default data folder
fn default_data_folder() -> PathBuf {
    if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("ecodan"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\ecodan"))
    } else {
        // ~/.local/share/ecodan, ~/Library/Application Support/ecodan on macOS
        dirs::data_local_dir()
            .map(|d| d.join("ecodan"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/ecodan"))
    }
}
