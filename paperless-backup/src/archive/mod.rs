//! Deterministic `.tar.gz` construction and structural verification.
//!
//! Archives never record timestamps: the tar mtime/atime/ctime fields and the
//! gzip header mtime are all zero, so two runs over the same tree produce the
//! same bytes.

mod entry;

use crate::fs::walker::walk;
use crate::utils::errors::{BackupError, Result};
use flate2::read::GzDecoder;
use flate2::{Compression, GzBuilder};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Mode applied to every finished archive
pub const ARCHIVE_MODE: u32 = 0o600;

/// File name suffix of every archive this tool writes
pub const ARCHIVE_SUFFIX: &str = ".tar.gz";

/// Result of a successful [`Archiver::create`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveSummary {
    /// Number of headers written (files, directories, links, specials)
    pub entries: usize,

    /// Size of the compressed archive on disk
    pub size_bytes: u64,
}

impl ArchiveSummary {
    pub fn size_mib(&self) -> f64 {
        self.size_bytes as f64 / 1024.0 / 1024.0
    }
}

/// Builds and verifies backup archives
#[derive(Debug, Clone, Default)]
pub struct Archiver {
    cancel_token: CancellationToken,
}

impl Archiver {
    /// Create an archiver (no cancellation support)
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an archiver that stops between entries once `cancel_token` fires
    pub fn with_cancel(cancel_token: CancellationToken) -> Self {
        Self { cancel_token }
    }

    /// Write every object under each of `sources`, in order, to `destination`.
    ///
    /// On failure the partially written destination is left in place.
    pub fn create(&self, destination: &Path, sources: &[PathBuf]) -> Result<ArchiveSummary> {
        info!("Creating compressed backup archive: {}", destination.display());

        let file = File::create(destination)?;
        let encoder = GzBuilder::new()
            .mtime(0)
            .write(BufWriter::new(file), Compression::default());
        let mut builder = tar::Builder::new(encoder);

        let mut entries = 0usize;
        for source in sources {
            debug!("Adding {} to archive", source.display());

            for walked in walk(source) {
                if self.cancel_token.is_cancelled() {
                    return Err(BackupError::Cancelled);
                }

                let walked = walked?;
                entry::append(&mut builder, &walked)?;
                entries += 1;
            }
        }

        let encoder = builder.into_inner()?;
        let file = encoder
            .finish()?
            .into_inner()
            .map_err(|e| BackupError::Io(e.into_error()))?;
        file.sync_all()?;
        drop(file);

        fs::set_permissions(destination, fs::Permissions::from_mode(ARCHIVE_MODE))?;

        let summary = ArchiveSummary {
            entries,
            size_bytes: fs::metadata(destination)?.len(),
        };

        info!(
            "Backup created successfully: {} ({:.2}MB)",
            destination.display(),
            summary.size_mib()
        );

        Ok(summary)
    }

    /// Read `archive` end-to-end and return how many entries it holds.
    ///
    /// This checks structure only: gzip framing and CRC, and tar header
    /// checksums and sizes. It does not compare contents with the source.
    pub fn verify(&self, archive: &Path) -> Result<usize> {
        info!("Verifying backup integrity...");

        let file = File::open(archive)?;
        let mut reader = tar::Archive::new(GzDecoder::new(BufReader::new(file)));

        let mut count = 0usize;
        for entry in reader.entries().map_err(corrupt)? {
            entry.map_err(corrupt)?;
            count += 1;
        }

        // The tar end marker may precede the gzip trailer; read through it so
        // a bad CRC or length is not missed.
        let mut decoder = reader.into_inner();
        io::copy(&mut decoder, &mut io::sink()).map_err(corrupt)?;

        info!("Backup integrity check passed ({} entries)", count);
        Ok(count)
    }
}

fn corrupt(err: io::Error) -> BackupError {
    BackupError::CorruptArchive(err.to_string())
}
