//! Errors surfaced by the `tenant-storage` binary.
//!
//! File operations themselves report `storage::StorageError`; the types
//! here wrap that together with startup failures.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Storage(#[from] crate::storage::StorageError),

    #[error("telemetry setup failed: {0}")]
    Telemetry(#[from] TelemetryError),
}

/// Problems loading or validating `Config`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value: {0}")]
    Validation(String),

    #[error("cannot read config file: {0}")]
    FileError(#[from] std::io::Error),

    #[error("malformed config JSON: {0}")]
    ParseError(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("logging: {0}")]
    LoggingInit(String),

    #[error("metrics: {0}")]
    MetricsInit(String),
}

pub type Result<T> = std::result::Result<T, AppError>;
