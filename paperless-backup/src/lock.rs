//! Lock file guarding the backup directory against concurrent runs.
//!
//! The lock is an empty file whose presence means "a run owns this
//! directory". There is no staleness detection: a run killed before it could
//! tear down leaves the file behind and it must be removed by hand.

use crate::utils::errors::{BackupError, Result};
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Exclusive ownership of the lock file, released on drop
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
}

impl LockGuard {
    /// Create the lock file, failing if it already exists.
    ///
    /// An existing lock file is left untouched.
    pub fn acquire(path: &Path) -> Result<Self> {
        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(_) => {
                debug!("Acquired lock {}", path.display());
                Ok(Self {
                    path: path.to_path_buf(),
                })
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                Err(BackupError::LockHeld(path.to_path_buf()))
            }
            Err(e) => Err(BackupError::Io(io::Error::new(
                e.kind(),
                format!("Failed to create lock file {}: {}", path.display(), e),
            ))),
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Released lock {}", self.path.display()),
            Err(e) => warn!("Failed to remove lock file {}: {}", self.path.display(), e),
        }
    }
}
