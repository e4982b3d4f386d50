//! Age-based pruning of old archives.
//!
//! Only regular files named `*.tar.gz` in the backup directory take part.
//! A pass never deletes the last archive: when every archive is past the
//! cutoff, the newest of them is kept.

use crate::archive::ARCHIVE_SUFFIX;
use crate::utils::Clock;
use chrono::{DateTime, Duration, Local};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// An archive found in the backup directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupRecord {
    pub path: PathBuf,
    pub modified: DateTime<Local>,
}

/// Outcome of a cleanup pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Archives found before the pass
    pub total: usize,
    /// Archives older than the cutoff
    pub old: usize,
    pub deleted: usize,
    /// Deletions that failed and were skipped
    pub failed: usize,
}

impl CleanupReport {
    pub fn remaining(&self) -> usize {
        self.total - self.deleted
    }
}

pub struct RetentionManager<'a> {
    clock: &'a dyn Clock,
    remove: fn(&Path) -> io::Result<()>,
}

impl<'a> RetentionManager<'a> {
    pub fn new(clock: &'a dyn Clock) -> Self {
        Self {
            clock,
            remove: |path| fs::remove_file(path),
        }
    }

    #[cfg(test)]
    fn with_remover(clock: &'a dyn Clock, remove: fn(&Path) -> io::Result<()>) -> Self {
        Self { clock, remove }
    }

    /// Oldest modification time that is still retained, or `None` when the
    /// window reaches past the representable range (nothing is old then)
    pub fn cutoff(&self, max_age_days: u32) -> Option<DateTime<Local>> {
        let window = Duration::try_days(i64::from(max_age_days))?;
        self.clock.now().checked_sub_signed(window)
    }

    /// Delete archives in `dir` older than `max_age_days`, keeping at least one
    pub fn clean(&self, dir: &Path, max_age_days: u32) -> CleanupReport {
        info!("Cleaning up backups older than {} days...", max_age_days);

        let all = match scan(dir) {
            Ok(records) => records,
            Err(e) => {
                warn!("Failed to read backup directory {}: {}", dir.display(), e);
                return CleanupReport::default();
            }
        };

        let mut old: Vec<&BackupRecord> = match self.cutoff(max_age_days) {
            Some(cutoff) => all.iter().filter(|r| r.modified < cutoff).collect(),
            None => Vec::new(),
        };

        let mut report = CleanupReport {
            total: all.len(),
            old: old.len(),
            ..Default::default()
        };

        if old.is_empty() {
            info!("No old backups to delete");
            info!("Total backups: {}", report.total);
            return report;
        }

        // Newest first, so the survivor of the all-old guard is the front entry
        old.sort_by(|a, b| b.modified.cmp(&a.modified));

        if old.len() >= all.len() {
            info!(
                "All backups are older than {} days - keeping the most recent one",
                max_age_days
            );
            old.remove(0);
        }

        for record in old {
            info!("Deleting old backup: {}", display_name(&record.path));
            match (self.remove)(&record.path) {
                Ok(()) => report.deleted += 1,
                Err(e) => {
                    warn!("Failed to delete {}: {}", record.path.display(), e);
                    report.failed += 1;
                }
            }
        }

        if report.deleted > 0 {
            info!("Deleted {} old backup(s)", report.deleted);
        } else {
            info!("No old backups to delete (keeping at least one backup)");
        }
        info!("Total backups: {}", report.remaining());

        report
    }
}

/// List every archive in `dir` with its modification time
pub fn scan(dir: &Path) -> std::io::Result<Vec<BackupRecord>> {
    let mut records = Vec::new();

    for entry in fs::read_dir(dir)? {
        let Ok(entry) = entry else { continue };

        let Ok(file_type) = entry.file_type() else { continue };
        if !file_type.is_file() || !is_archive_name(&entry.file_name().to_string_lossy()) {
            continue;
        }

        let Ok(modified) = entry.metadata().and_then(|m| m.modified()) else {
            continue;
        };

        records.push(BackupRecord {
            path: entry.path(),
            modified: DateTime::<Local>::from(modified),
        });
    }

    Ok(records)
}

/// Whether `name` matches `*.tar.gz`
pub fn is_archive_name(name: &str) -> bool {
    name.ends_with(ARCHIVE_SUFFIX)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
