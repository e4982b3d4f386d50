//! Pipeline stages, in the only order they are ever entered.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Start,
    Lock,
    Preflight,
    ServiceStop,
    ResolveVolumes,
    DiskSpaceCheck,
    ArchiveCreate,
    ArchiveVerify,
    RetentionCleanup,
    ServiceRestore,
    Done,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Start => "START",
            Stage::Lock => "LOCK",
            Stage::Preflight => "PREFLIGHT",
            Stage::ServiceStop => "SERVICE_STOP",
            Stage::ResolveVolumes => "RESOLVE_VOLUMES",
            Stage::DiskSpaceCheck => "DISKSPACE_CHECK",
            Stage::ArchiveCreate => "ARCHIVE_CREATE",
            Stage::ArchiveVerify => "ARCHIVE_VERIFY",
            Stage::RetentionCleanup => "RETENTION_CLEANUP",
            Stage::ServiceRestore => "SERVICE_RESTORE",
            Stage::Done => "DONE",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PIPELINE: [Stage; 11] = [
        Stage::Start,
        Stage::Lock,
        Stage::Preflight,
        Stage::ServiceStop,
        Stage::ResolveVolumes,
        Stage::DiskSpaceCheck,
        Stage::ArchiveCreate,
        Stage::ArchiveVerify,
        Stage::RetentionCleanup,
        Stage::ServiceRestore,
        Stage::Done,
    ];

    #[test]
    fn test_order_is_strictly_increasing() {
        assert!(PIPELINE.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_display() {
        assert_eq!(Stage::DiskSpaceCheck.to_string(), "DISKSPACE_CHECK");
        assert_eq!(Stage::ServiceRestore.to_string(), "SERVICE_RESTORE");
    }
}
