//! Host checks run before anything is stopped or written.

use crate::process::{CommandRunner, SystemRunner};
use crate::utils::errors::{BackupError, Result};
use std::ffi::OsStr;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tracing::info;

/// Tools the pipeline shells out to
pub const REQUIRED_TOOLS: &[&str] = &["docker", "systemctl"];

pub trait Preflight: Send + Sync {
    fn check_privileges(&self) -> Result<()>;
    fn check_tools(&self) -> Result<()>;
    fn check_runtime(&self) -> Result<()>;
    fn check_disk_space(&self, path: &Path, required_mb: u64) -> Result<()>;
}

/// Checks against the real host
pub struct HostPreflight<R: CommandRunner = SystemRunner> {
    runner: R,
}

impl HostPreflight<SystemRunner> {
    pub fn new() -> Self {
        Self::with_runner(SystemRunner)
    }
}

impl Default for HostPreflight<SystemRunner> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: CommandRunner> HostPreflight<R> {
    pub fn with_runner(runner: R) -> Self {
        Self { runner }
    }
}

impl<R: CommandRunner> Preflight for HostPreflight<R> {
    fn check_privileges(&self) -> Result<()> {
        if !nix::unistd::geteuid().is_root() {
            return Err(BackupError::NotRoot);
        }
        Ok(())
    }

    fn check_tools(&self) -> Result<()> {
        info!("Checking required system tools...");

        let path_var = std::env::var_os("PATH").unwrap_or_default();
        let missing = missing_tools(REQUIRED_TOOLS, &path_var);
        if !missing.is_empty() {
            return Err(BackupError::MissingTools(missing));
        }

        info!("All required system tools available");
        Ok(())
    }

    fn check_runtime(&self) -> Result<()> {
        match self.runner.status("docker", &["info"]) {
            Ok(true) => Ok(()),
            _ => Err(BackupError::RuntimeUnreachable),
        }
    }

    fn check_disk_space(&self, path: &Path, required_mb: u64) -> Result<()> {
        let available_mb = available_mb(path)?;
        if available_mb < required_mb {
            return Err(BackupError::InsufficientSpace {
                available_mb,
                required_mb,
            });
        }

        info!("Available disk space: {}MB", available_mb);
        Ok(())
    }
}

/// Space available to unprivileged writers on the filesystem holding `path`
pub fn available_mb(path: &Path) -> Result<u64> {
    let stat = nix::sys::statvfs::statvfs(path)
        .map_err(|e| BackupError::DiskSpace(format!("{}: {}", path.display(), e)))?;

    let available = (stat.blocks_available() as u64).saturating_mul(stat.fragment_size() as u64);
    Ok(available / 1024 / 1024)
}

/// Names from `tools` with no executable anywhere on `path_var`
pub fn missing_tools(tools: &[&str], path_var: &OsStr) -> Vec<String> {
    tools
        .iter()
        .filter(|tool| find_executable(tool, path_var).is_none())
        .map(|tool| tool.to_string())
        .collect()
}

fn find_executable(name: &str, path_var: &OsStr) -> Option<PathBuf> {
    std::env::split_paths(path_var)
        .map(|dir| dir.join(name))
        .find(|candidate| {
            candidate
                .metadata()
                .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
                .unwrap_or(false)
        })
}
