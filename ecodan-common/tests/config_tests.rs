//! Configuration loading and data folder resolution
//!
//! Tests that touch ECODAN_CONFIG or ECODAN_DATA_FOLDER are marked #[serial]
//! so they never race on the process environment.

use ecodan_common::config::{TomlConfig, CONFIG_ENV_VAR, DATA_FOLDER_ENV_VAR};
use ecodan_common::Error;
use serial_test::serial;
use std::env;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write_config(dir: &TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("config.toml");
    std::fs::write(&path, body).unwrap();
    path
}

#[test]
#[serial]
fn test_cli_path_takes_priority_over_env() {
    let dir = TempDir::new().unwrap();
    let cli = write_config(&dir, "log_file_name = \"from_cli.csv\"\n");
    let env_path = dir.path().join("env.toml");
    std::fs::write(&env_path, "log_file_name = \"from_env.csv\"\n").unwrap();

    env::set_var(CONFIG_ENV_VAR, &env_path);
    let config = TomlConfig::load(Some(&cli)).unwrap();
    env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(config.log_file_name, "from_cli.csv");
}

#[test]
#[serial]
fn test_env_path_used_without_cli() {
    let dir = TempDir::new().unwrap();
    let env_path = write_config(&dir, "[logging]\nlevel = \"debug\"\n");

    env::set_var(CONFIG_ENV_VAR, &env_path);
    let config = TomlConfig::load(None).unwrap();
    env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(config.logging.level, "debug");
}

#[test]
#[serial]
fn test_explicit_missing_file_is_error() {
    env::remove_var(CONFIG_ENV_VAR);
    let err = TomlConfig::load(Some(Path::new("/nonexistent/ecodan/config.toml"))).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[test]
#[serial]
fn test_env_named_missing_file_is_error() {
    env::set_var(CONFIG_ENV_VAR, "/nonexistent/ecodan/env-config.toml");
    let result = TomlConfig::load(None);
    env::remove_var(CONFIG_ENV_VAR);

    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
#[serial]
fn test_data_folder_priority() {
    let config = TomlConfig::from_toml_str("data_folder = \"/from/toml\"\n").unwrap();

    env::set_var(DATA_FOLDER_ENV_VAR, "/from/env");
    assert_eq!(
        config.resolve_data_folder(Some(Path::new("/from/cli"))),
        PathBuf::from("/from/cli")
    );
    assert_eq!(config.resolve_data_folder(None), PathBuf::from("/from/env"));

    env::remove_var(DATA_FOLDER_ENV_VAR);
    assert_eq!(config.resolve_data_folder(None), PathBuf::from("/from/toml"));

    let defaults = TomlConfig::default();
    let fallback = defaults.resolve_data_folder(None);
    assert!(fallback.ends_with("ecodan"));
}

#[test]
fn test_full_file_parses() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
data_folder = "/opt/ecodan/data"
log_file_name = "ecodan_log.csv"

[logging]
level = "warn"

[collector]
flush_interval_secs = 60

[source]
events_url = "http://10.0.0.5/events"
reconnect_delay_secs = 30

[auxiliary]
base_url = "http://ha.local:8123"
token_file = "/opt/ecodan/ha-token.txt"
entities = ["climate.a", "climate.b"]
scale = 1.0
timeout_secs = 3

[report]
historical_file = "/srv/history.json"
"#,
    );

    let config = TomlConfig::from_file(&path).unwrap();
    assert_eq!(config.source.events_url, "http://10.0.0.5/events");
    assert_eq!(config.source.reconnect_delay().as_secs(), 30);
    assert_eq!(config.auxiliary.entities.len(), 2);
    assert_eq!(config.auxiliary.timeout().as_secs(), 3);
    assert_eq!(
        config.historical_path(Path::new("/opt/ecodan/data")),
        PathBuf::from("/srv/history.json")
    );
}

#[test]
fn test_invalid_scale_rejected() {
    let err = TomlConfig::from_toml_str("[auxiliary]\nscale = -1.0\n").unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}
