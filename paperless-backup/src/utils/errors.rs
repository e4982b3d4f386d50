//! Custom error types for the backup run.
//!
//! Every variant is a condition that aborts the run. The Display text is the
//! single line written to the log before the process exits.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Backup already running (lock file exists: {})", .0.display())]
    LockHeld(PathBuf),

    #[error("This tool must be run as root")]
    NotRoot,

    #[error("Missing required tools: {}", .0.join(", "))]
    MissingTools(Vec<String>),

    #[error("Docker daemon is not running or not accessible")]
    RuntimeUnreachable,

    #[error("Insufficient disk space. Available: {available_mb}MB, Required: {required_mb}MB")]
    InsufficientSpace { available_mb: u64, required_mb: u64 },

    #[error("Failed to check disk space: {0}")]
    DiskSpace(String),

    #[error("Failed to resolve volume {name}: {reason}")]
    VolumeResolution { name: String, reason: String },

    #[error("Service error: {0}")]
    Service(String),

    #[error("Backup integrity check failed: {0}")]
    CorruptArchive(String),

    #[error("Backup cancelled")]
    Cancelled,
}

impl From<config::ConfigError> for BackupError {
    fn from(err: config::ConfigError) -> Self {
        BackupError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BackupError>;
