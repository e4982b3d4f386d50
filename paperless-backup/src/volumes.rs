//! Mapping docker volume names to host paths.

use crate::process::{CommandRunner, SystemRunner};
use crate::utils::errors::{BackupError, Result};
use std::path::PathBuf;

pub trait VolumeResolver: Send + Sync {
    /// Host directory backing volume `name`
    fn resolve(&self, name: &str) -> Result<PathBuf>;
}

/// Resolves volumes with `docker volume inspect`
pub struct DockerVolumes<R: CommandRunner = SystemRunner> {
    runner: R,
}

impl DockerVolumes<SystemRunner> {
    pub fn new() -> Self {
        Self::with_runner(SystemRunner)
    }
}

impl Default for DockerVolumes<SystemRunner> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: CommandRunner> DockerVolumes<R> {
    pub fn with_runner(runner: R) -> Self {
        Self { runner }
    }
}

impl<R: CommandRunner> VolumeResolver for DockerVolumes<R> {
    fn resolve(&self, name: &str) -> Result<PathBuf> {
        let failed = |reason: String| BackupError::VolumeResolution {
            name: name.to_string(),
            reason,
        };

        let output = self
            .runner
            .output(
                "docker",
                &["volume", "inspect", name, "--format", "{{ .Mountpoint }}"],
            )
            .map_err(|e| failed(e.to_string()))?;

        if !output.success {
            let stderr = output.stderr.trim();
            return Err(failed(if stderr.is_empty() {
                "docker volume inspect failed".to_string()
            } else {
                stderr.to_string()
            }));
        }

        let mountpoint = output.stdout.trim();
        if mountpoint.is_empty() {
            return Err(failed("empty mountpoint".to_string()));
        }

        let path = PathBuf::from(mountpoint);
        if !path.exists() {
            return Err(failed(format!("volume path does not exist: {}", path.display())));
        }

        Ok(path)
    }
}
