//! Filesystem traversal and metadata for archive construction.

pub mod metadata;
pub mod walker;
