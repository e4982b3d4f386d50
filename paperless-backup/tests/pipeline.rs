use chrono::{DateTime, Duration, Local, TimeZone};
use paperless_backup::archive::Archiver;
use paperless_backup::executor::{BackupExecutor, BackupJob};
use paperless_backup::preflight::Preflight;
use paperless_backup::service::ServiceControl;
use paperless_backup::utils::FixedClock;
use paperless_backup::volumes::VolumeResolver;
use paperless_backup::{BackupError, Result};
use std::collections::HashMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct FakePreflight {
    runtime_down: bool,
    available_mb: u64,
}

impl Preflight for FakePreflight {
    fn check_privileges(&self) -> Result<()> {
        Ok(())
    }

    fn check_tools(&self) -> Result<()> {
        Ok(())
    }

    fn check_runtime(&self) -> Result<()> {
        if self.runtime_down {
            return Err(BackupError::RuntimeUnreachable);
        }
        Ok(())
    }

    fn check_disk_space(&self, _path: &Path, required_mb: u64) -> Result<()> {
        if self.available_mb < required_mb {
            return Err(BackupError::InsufficientSpace {
                available_mb: self.available_mb,
                required_mb,
            });
        }
        Ok(())
    }
}

/// Records stop/start calls, noting whether the lock file still existed at restart
struct FakeService {
    running: bool,
    was_running: bool,
    restored: bool,
    lock_path: PathBuf,
    events: Arc<Mutex<Vec<String>>>,
}

impl ServiceControl for FakeService {
    fn stop(&mut self) -> Result<()> {
        if self.running {
            self.was_running = true;
            self.running = false;
            self.events.lock().unwrap().push("stop".to_string());
        }
        Ok(())
    }

    fn restore(&mut self) {
        if self.was_running && !self.restored {
            self.restored = true;
            self.running = true;
            let held = if self.lock_path.exists() { "locked" } else { "unlocked" };
            self.events.lock().unwrap().push(format!("start {}", held));
        }
    }

    fn was_running(&self) -> bool {
        self.was_running
    }
}

struct FakeVolumes {
    paths: HashMap<String, PathBuf>,
    cancel_on_resolve: Option<CancellationToken>,
}

impl VolumeResolver for FakeVolumes {
    fn resolve(&self, name: &str) -> Result<PathBuf> {
        if let Some(token) = &self.cancel_on_resolve {
            token.cancel();
        }
        self.paths
            .get(name)
            .cloned()
            .ok_or_else(|| BackupError::VolumeResolution {
                name: name.to_string(),
                reason: "no such volume".to_string(),
            })
    }
}

struct Harness {
    _root: TempDir,
    backup_dir: PathBuf,
    volumes: HashMap<String, PathBuf>,
    events: Arc<Mutex<Vec<String>>>,
}

impl Harness {
    fn new() -> Self {
        let root = TempDir::new().unwrap();
        let backup_dir = root.path().join("backups");
        fs::create_dir(&backup_dir).unwrap();

        let mut volumes = HashMap::new();
        for name in ["paperless-ngx_data", "paperless-ngx_media"] {
            let dir = root.path().join("volumes").join(name).join("_data");
            fs::create_dir_all(dir.join("documents")).unwrap();
            fs::write(dir.join("documents/0001.pdf"), format!("{} payload", name)).unwrap();
            fs::write(dir.join("index.db"), b"sqlite").unwrap();
            volumes.insert(name.to_string(), dir);
        }

        Self {
            _root: root,
            backup_dir,
            volumes,
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn job(&self) -> BackupJob {
        BackupJob {
            backup_dir: self.backup_dir.clone(),
            lock_path: self.lock_path(),
            volume_names: vec![
                "paperless-ngx_data".to_string(),
                "paperless-ngx_media".to_string(),
            ],
            max_age_days: 3,
            required_space_mb: 100,
        }
    }

    fn lock_path(&self) -> PathBuf {
        self.backup_dir.join("backup.lock")
    }

    fn executor(&self, preflight: FakePreflight, running: bool, now: DateTime<Local>) -> BackupExecutor {
        BackupExecutor::new(
            Box::new(preflight),
            Box::new(FakeService {
                running,
                was_running: false,
                restored: false,
                lock_path: self.lock_path(),
                events: self.events.clone(),
            }),
            Box::new(FakeVolumes {
                paths: self.volumes.clone(),
                cancel_on_resolve: None,
            }),
            Box::new(FixedClock(now)),
        )
    }

    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn archives(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(&self.backup_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|n| n.ends_with(".tar.gz"))
            .collect();
        names.sort();
        names
    }
}

fn plenty_of_space() -> FakePreflight {
    FakePreflight {
        available_mb: 50_000,
        ..Default::default()
    }
}

fn age(path: &Path, days: i64) {
    let when = SystemTime::now() - std::time::Duration::from_secs(days as u64 * 24 * 3600);
    File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(when)
        .unwrap();
}

#[test]
fn test_successful_run() {
    let harness = Harness::new();
    let stale = harness.backup_dir.join("20200101_000000.tar.gz");
    let recent = harness.backup_dir.join("20200102_000000.tar.gz");
    fs::write(&stale, b"old").unwrap();
    fs::write(&recent, b"new").unwrap();
    age(&stale, 10);
    age(&recent, 1);

    let now = Local::now();
    let report = harness
        .executor(plenty_of_space(), true, now)
        .execute(&harness.job())
        .unwrap();

    let expected_name = format!("{}.tar.gz", now.format("%Y%m%d_%H%M%S"));
    assert_eq!(report.archive, harness.backup_dir.join(&expected_name));
    assert!(report.service_was_running);

    // Two volumes, each: root, documents/, documents/0001.pdf, index.db
    assert_eq!(report.summary.entries, 8);
    assert_eq!(Archiver::new().verify(&report.archive).unwrap(), 8);

    assert_eq!(report.cleanup.total, 3);
    assert_eq!(report.cleanup.deleted, 1);
    assert!(!stale.exists());
    assert!(recent.exists());

    assert!(!harness.lock_path().exists());
    assert_eq!(harness.events(), vec!["stop", "start locked"]);
}

#[test]
fn test_lock_held_has_no_side_effects() {
    let harness = Harness::new();
    fs::write(harness.lock_path(), b"").unwrap();

    let err = harness
        .executor(plenty_of_space(), true, Local::now())
        .execute(&harness.job())
        .unwrap_err();

    assert!(matches!(err, BackupError::LockHeld(_)));
    assert!(harness.lock_path().exists());
    assert!(harness.events().is_empty());
    assert!(harness.archives().is_empty());
}

#[test]
fn test_preflight_failure_leaves_service_running() {
    let harness = Harness::new();
    let preflight = FakePreflight {
        runtime_down: true,
        available_mb: 50_000,
    };

    let err = harness
        .executor(preflight, true, Local::now())
        .execute(&harness.job())
        .unwrap_err();

    assert!(matches!(err, BackupError::RuntimeUnreachable));
    assert!(harness.events().is_empty());
    assert!(!harness.lock_path().exists());
}

#[test]
fn test_volume_failure_restores_service() {
    let harness = Harness::new();
    let mut job = harness.job();
    job.volume_names.push("paperless-ngx_redisdata".to_string());

    let err = harness
        .executor(plenty_of_space(), true, Local::now())
        .execute(&job)
        .unwrap_err();

    assert!(
        matches!(err, BackupError::VolumeResolution { ref name, .. } if name == "paperless-ngx_redisdata")
    );
    assert_eq!(harness.events(), vec!["stop", "start locked"]);
    assert!(!harness.lock_path().exists());
    assert!(harness.archives().is_empty());
}

#[test]
fn test_insufficient_space_creates_no_archive() {
    let harness = Harness::new();
    let preflight = FakePreflight {
        available_mb: 10,
        ..Default::default()
    };

    let err = harness
        .executor(preflight, true, Local::now())
        .execute(&harness.job())
        .unwrap_err();

    assert!(matches!(
        err,
        BackupError::InsufficientSpace { available_mb: 10, required_mb: 100 }
    ));
    assert!(harness.archives().is_empty());
    assert_eq!(harness.events(), vec!["stop", "start locked"]);
    assert!(!harness.lock_path().exists());
}

#[test]
fn test_stopped_service_is_not_started() {
    let harness = Harness::new();

    let report = harness
        .executor(plenty_of_space(), false, Local::now())
        .execute(&harness.job())
        .unwrap();

    assert!(!report.service_was_running);
    assert!(harness.events().is_empty());
    assert_eq!(harness.archives().len(), 1);
}

#[test]
fn test_cancelled_before_start() {
    let harness = Harness::new();
    let token = CancellationToken::new();
    token.cancel();

    let err = harness
        .executor(plenty_of_space(), true, Local::now())
        .with_cancel(token)
        .execute(&harness.job())
        .unwrap_err();

    assert!(matches!(err, BackupError::Cancelled));
    assert!(!harness.lock_path().exists());
    assert!(harness.events().is_empty());
}

#[test]
fn test_cancelled_mid_run_tears_down() {
    let harness = Harness::new();
    let token = CancellationToken::new();
    let mut executor = BackupExecutor::new(
        Box::new(plenty_of_space()),
        Box::new(FakeService {
            running: true,
            was_running: false,
            restored: false,
            lock_path: harness.lock_path(),
            events: harness.events.clone(),
        }),
        Box::new(FakeVolumes {
            paths: harness.volumes.clone(),
            cancel_on_resolve: Some(token.clone()),
        }),
        Box::new(FixedClock(Local::now())),
    )
    .with_cancel(token);

    let err = executor.execute(&harness.job()).unwrap_err();

    assert!(matches!(err, BackupError::Cancelled));
    assert_eq!(harness.events(), vec!["stop", "start locked"]);
    assert!(!harness.lock_path().exists());
    assert!(harness.archives().is_empty());
}

#[test]
fn test_repeat_runs_produce_identical_archives() {
    let harness = Harness::new();
    let first_at = Local.with_ymd_and_hms(2024, 6, 1, 3, 0, 0).unwrap();
    let second_at = first_at + Duration::seconds(1);

    let first = harness
        .executor(plenty_of_space(), true, first_at)
        .execute(&harness.job())
        .unwrap();

    for dir in harness.volumes.values() {
        age(&dir.join("index.db"), 2);
    }

    let second = harness
        .executor(plenty_of_space(), true, second_at)
        .execute(&harness.job())
        .unwrap();

    assert_ne!(first.archive, second.archive);
    assert_eq!(fs::read(&first.archive).unwrap(), fs::read(&second.archive).unwrap());
}
