//! Paperless Backup Library
//!
//! Crash-safe backups of paperless-ngx docker volumes into verified,
//! deterministic tar.gz archives with age-based retention.

pub mod archive;
pub mod config;
pub mod daemon;
pub mod executor;
pub mod fs;
pub mod lock;
pub mod preflight;
pub mod process;
pub mod retention;
pub mod service;
pub mod utils;
pub mod volumes;

// Re-export commonly used types
pub use config::Config;
pub use utils::errors::{BackupError, Result};
