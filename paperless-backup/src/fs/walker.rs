//! Directory traversal for archive construction.
//!
//! The walk is lazy: each call to [`walk`] yields `(path, metadata)` pairs on
//! demand, parents before children and siblings in file-name order, so two
//! identical trees are always visited identically.

use std::fs::Metadata;
use std::io;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// One filesystem object discovered during the walk
#[derive(Debug, Clone)]
pub struct WalkEntry {
    /// Full walked path
    pub path: PathBuf,

    /// Metadata of the object itself (symlinks are not followed)
    pub metadata: Metadata,
}

impl WalkEntry {
    /// Name of this object inside an archive: the walked path without its
    /// leading separator.
    pub fn archive_name(&self) -> PathBuf {
        archive_name(&self.path)
    }
}

/// Strip root and prefix components so the result is always relative
pub fn archive_name(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::RootDir | Component::Prefix(_)))
        .collect()
}

/// Lazy traversal of a single source tree
pub struct TreeWalk {
    inner: walkdir::IntoIter,
}

impl Iterator for TreeWalk {
    type Item = io::Result<WalkEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = match self.inner.next()? {
            Ok(entry) => entry,
            Err(e) => return Some(Err(io::Error::from(e))),
        };

        Some(entry.metadata().map_err(io::Error::from).map(|metadata| WalkEntry {
            path: entry.path().to_path_buf(),
            metadata,
        }))
    }
}

/// Walk `root` recursively, including `root` itself
///
/// # Example
/// ```no_run
/// use paperless_backup::fs::walker::walk;
/// use std::path::Path;
///
/// for entry in walk(Path::new("/var/lib/docker/volumes/data/_data")) {
///     let entry = entry.unwrap();
///     println!("{}", entry.archive_name().display());
/// }
/// ```
pub fn walk(root: &Path) -> TreeWalk {
    TreeWalk {
        inner: WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter(),
    }
}

/// Number of objects a walk of `root` visits
#[cfg(test)]
pub(crate) fn count_entries(root: &Path) -> io::Result<usize> {
    walk(root).try_fold(0, |count, entry| entry.map(|_| count + 1))
}
