//! Common error types for the Ecodan telemetry workspace

use thiserror::Error;

/// Common result type for Ecodan operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the logger and report binaries
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// TOML bootstrap file could not be parsed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON payload (historical baseline, event stream) could not be parsed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Persisted stream header does not match the current channel set
    #[error("Schema mismatch: {0}")]
    Schema(String),

    /// A persisted value or timestamp could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// Inbound telemetry or auxiliary source failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
