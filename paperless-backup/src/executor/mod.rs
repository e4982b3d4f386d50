//! Backup job executor - orchestrates one complete backup run.
//!
//! Stages run strictly in order (see [`Stage`]); the first error ends the run.
//! The lock file and the stopped service are held by guards, so every exit
//! path (success, error, cancellation, unwinding) restores the service and
//! removes the lock, in that order.

pub mod stage;

use crate::archive::{ArchiveSummary, Archiver, ARCHIVE_SUFFIX};
use crate::config::Config;
use crate::lock::LockGuard;
use crate::preflight::{HostPreflight, Preflight};
use crate::retention::{CleanupReport, RetentionManager};
use crate::service::{ServiceControl, ServiceGuard, SystemdService};
use crate::utils::errors::{BackupError, Result};
use crate::utils::{Clock, SystemClock};
use crate::volumes::{DockerVolumes, VolumeResolver};
use chrono::{DateTime, Local};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub use stage::Stage;

/// Everything a run needs to know, taken from [`Config`]
#[derive(Debug, Clone)]
pub struct BackupJob {
    pub backup_dir: PathBuf,
    pub lock_path: PathBuf,
    pub volume_names: Vec<String>,
    pub max_age_days: u32,
    pub required_space_mb: u64,
}

impl From<&Config> for BackupJob {
    fn from(config: &Config) -> Self {
        Self {
            backup_dir: config.backup.dir.clone(),
            lock_path: config.lock_path(),
            volume_names: config.volumes.names.clone(),
            max_age_days: config.backup.max_age_days,
            required_space_mb: config.backup.required_space_mb,
        }
    }
}

/// Outcome of a successful run
#[derive(Debug, Clone)]
pub struct BackupReport {
    pub archive: PathBuf,
    pub summary: ArchiveSummary,
    pub cleanup: CleanupReport,
    pub service_was_running: bool,
}

/// Name of the archive for a run whose archive stage began at `started`.
/// Names sort lexicographically in start order.
pub fn archive_file_name(started: DateTime<Local>) -> String {
    format!("{}{}", started.format("%Y%m%d_%H%M%S"), ARCHIVE_SUFFIX)
}

/// Tracks the current stage and aborts on cancellation at each transition
struct StageTracker {
    current: Stage,
    cancel_token: CancellationToken,
}

impl StageTracker {
    fn new(cancel_token: CancellationToken) -> Self {
        Self {
            current: Stage::Start,
            cancel_token,
        }
    }

    fn enter(&mut self, next: Stage) -> Result<()> {
        if self.cancel_token.is_cancelled() {
            return Err(BackupError::Cancelled);
        }
        debug!("Stage {} -> {}", self.current, next);
        self.current = next;
        Ok(())
    }
}

/// Main backup executor
pub struct BackupExecutor {
    preflight: Box<dyn Preflight>,
    service: Box<dyn ServiceControl>,
    volumes: Box<dyn VolumeResolver>,
    clock: Box<dyn Clock>,
    cancel_token: CancellationToken,
}

impl BackupExecutor {
    /// Create an executor from explicit collaborators (no cancellation support)
    pub fn new(
        preflight: Box<dyn Preflight>,
        service: Box<dyn ServiceControl>,
        volumes: Box<dyn VolumeResolver>,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            preflight,
            service,
            volumes,
            clock,
            cancel_token: CancellationToken::new(),
        }
    }

    /// Create an executor wired to the host: systemd, docker and the system clock
    pub fn for_host(config: &Config) -> Self {
        Self::new(
            Box::new(HostPreflight::new()),
            Box::new(SystemdService::new(
                config.service.name.clone(),
                Duration::from_secs(config.service.settle_secs),
            )),
            Box::new(DockerVolumes::new()),
            Box::new(SystemClock),
        )
    }

    /// Abort the run at the next stage or archive entry once `cancel_token` fires
    pub fn with_cancel(mut self, cancel_token: CancellationToken) -> Self {
        self.cancel_token = cancel_token;
        self
    }

    /// Execute a backup job
    pub fn execute(&mut self, job: &BackupJob) -> Result<BackupReport> {
        let mut tracker = StageTracker::new(self.cancel_token.clone());

        let result = self.run(job, &mut tracker);
        if let Err(e) = &result {
            debug!("Backup aborted in stage {}: {}", tracker.current, e);
        }
        result
    }

    fn run(&mut self, job: &BackupJob, tracker: &mut StageTracker) -> Result<BackupReport> {
        info!("Starting paperless-ngx backup");

        tracker.enter(Stage::Lock)?;
        let lock = LockGuard::acquire(&job.lock_path)?;

        tracker.enter(Stage::Preflight)?;
        self.preflight.check_privileges()?;
        self.preflight.check_tools()?;
        self.preflight.check_runtime()?;

        tracker.enter(Stage::ServiceStop)?;
        let service = ServiceGuard::stop(self.service.as_mut())?;

        tracker.enter(Stage::ResolveVolumes)?;
        info!("Inspecting docker volumes...");
        let mut sources = Vec::with_capacity(job.volume_names.len());
        for name in &job.volume_names {
            sources.push(self.volumes.resolve(name)?);
        }
        info!("Volume locations:");
        for (name, path) in job.volume_names.iter().zip(&sources) {
            info!("  - {}: {}", name, path.display());
        }

        tracker.enter(Stage::DiskSpaceCheck)?;
        self.preflight
            .check_disk_space(&job.backup_dir, job.required_space_mb)?;

        tracker.enter(Stage::ArchiveCreate)?;
        let archive = job.backup_dir.join(archive_file_name(self.clock.now()));
        let archiver = Archiver::with_cancel(tracker.cancel_token.clone());
        let summary = archiver.create(&archive, &sources)?;

        tracker.enter(Stage::ArchiveVerify)?;
        let verified = archiver.verify(&archive)?;
        if verified != summary.entries {
            return Err(BackupError::CorruptArchive(format!(
                "expected {} entries, found {}",
                summary.entries, verified
            )));
        }

        tracker.enter(Stage::RetentionCleanup)?;
        let cleanup =
            RetentionManager::new(self.clock.as_ref()).clean(&job.backup_dir, job.max_age_days);

        // No cancellation check from here on: the archive is complete and
        // what remains is teardown.
        debug!("Stage {} -> {}", tracker.current, Stage::ServiceRestore);
        tracker.current = Stage::ServiceRestore;
        let service_was_running = service.was_running();
        service.release();
        drop(lock);

        tracker.current = Stage::Done;
        info!("Backup completed successfully");

        Ok(BackupReport {
            archive,
            summary,
            cleanup,
            service_was_running,
        })
    }
}
