//! Quiescing the managed systemd unit for the duration of a backup.

use crate::process::{CommandRunner, SystemRunner};
use crate::utils::errors::{BackupError, Result};
use std::time::Duration;
use tracing::{info, warn};

/// Stop/restore control over the managed service
pub trait ServiceControl: Send {
    /// Stop the service if it is running, remembering that it was.
    /// Calling this again after a successful stop does nothing.
    fn stop(&mut self) -> Result<()>;

    /// Start the service again if [`ServiceControl::stop`] found it running.
    /// Failures are logged, never returned.
    fn restore(&mut self);

    /// Whether the service was running before the first stop
    fn was_running(&self) -> bool;
}

/// A systemd unit driven through `systemctl`
pub struct SystemdService<R: CommandRunner = SystemRunner> {
    runner: R,
    name: String,
    settle: Duration,
    was_running: bool,
    stopped: bool,
    restored: bool,
}

impl SystemdService<SystemRunner> {
    pub fn new(name: impl Into<String>, settle: Duration) -> Self {
        Self::with_runner(SystemRunner, name, settle)
    }
}

impl<R: CommandRunner> SystemdService<R> {
    pub fn with_runner(runner: R, name: impl Into<String>, settle: Duration) -> Self {
        Self {
            runner,
            name: name.into(),
            settle,
            was_running: false,
            stopped: false,
            restored: false,
        }
    }

    fn is_active(&self) -> bool {
        matches!(
            self.runner.status("systemctl", &["is-active", "--quiet", &self.name]),
            Ok(true)
        )
    }
}

impl<R: CommandRunner> ServiceControl for SystemdService<R> {
    fn stop(&mut self) -> Result<()> {
        if self.stopped {
            return Ok(());
        }

        info!("Checking {} state...", self.name);

        if !self.is_active() {
            info!("{} is already stopped", self.name);
            self.stopped = true;
            return Ok(());
        }

        info!("{} is running - stopping for backup...", self.name);
        self.was_running = true;

        let stopped = self
            .runner
            .status("systemctl", &["stop", &self.name])
            .map_err(|e| BackupError::Service(format!("Failed to stop {}: {}", self.name, e)))?;
        if !stopped {
            return Err(BackupError::Service(format!("Failed to stop {}", self.name)));
        }

        self.stopped = true;
        info!("{} stopped", self.name);

        if !self.settle.is_zero() {
            std::thread::sleep(self.settle);
        }

        Ok(())
    }

    fn restore(&mut self) {
        if !self.was_running || self.restored {
            return;
        }
        self.restored = true;

        info!("Restoring {} to running state...", self.name);
        match self.runner.status("systemctl", &["start", &self.name]) {
            Ok(true) => info!("{} started", self.name),
            Ok(false) => warn!("Failed to restart {}", self.name),
            Err(e) => warn!("Failed to restart {}: {}", self.name, e),
        }
    }

    fn was_running(&self) -> bool {
        self.was_running
    }
}

/// Holds the service stopped; restores it on drop
pub struct ServiceGuard<'a> {
    service: &'a mut dyn ServiceControl,
}

impl<'a> ServiceGuard<'a> {
    /// Stop `service`. The guard exists before the stop is attempted, so a
    /// stop that fails halfway still gets a restore.
    pub fn stop(service: &'a mut dyn ServiceControl) -> Result<Self> {
        let mut guard = Self { service };
        guard.service.stop()?;
        Ok(guard)
    }

    pub fn was_running(&self) -> bool {
        self.service.was_running()
    }

    /// Restore the service now
    pub fn release(self) {}
}

impl Drop for ServiceGuard<'_> {
    fn drop(&mut self) {
        self.service.restore();
    }
}
