//! File metadata as it is recorded in an archive header.
//!
//! Timestamps are deliberately absent: archives never carry them.

use std::fs::Metadata;
use std::os::unix::fs::{FileTypeExt, MetadataExt};

/// Kind of filesystem object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Regular,
    Directory,
    Symlink,
    CharDevice,
    BlockDevice,
    Fifo,
    Socket,
}

impl EntryKind {
    pub fn from_metadata(metadata: &Metadata) -> Self {
        let file_type = metadata.file_type();
        if file_type.is_symlink() {
            EntryKind::Symlink
        } else if file_type.is_dir() {
            EntryKind::Directory
        } else if file_type.is_char_device() {
            EntryKind::CharDevice
        } else if file_type.is_block_device() {
            EntryKind::BlockDevice
        } else if file_type.is_fifo() {
            EntryKind::Fifo
        } else if file_type.is_socket() {
            EntryKind::Socket
        } else {
            EntryKind::Regular
        }
    }
}

/// Header-relevant metadata of one object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    pub kind: EntryKind,

    /// Payload size; zero for everything but regular files
    pub size: u64,

    /// Permission bits including setuid/setgid/sticky
    pub mode: u32,

    pub uid: u64,
    pub gid: u64,

    /// Device number for character and block devices
    pub rdev: u64,
}

impl FileMetadata {
    pub fn from_metadata(metadata: &Metadata) -> Self {
        let kind = EntryKind::from_metadata(metadata);
        Self {
            kind,
            size: if kind == EntryKind::Regular { metadata.len() } else { 0 },
            mode: metadata.mode() & 0o7777,
            uid: u64::from(metadata.uid()),
            gid: u64::from(metadata.gid()),
            rdev: metadata.rdev(),
        }
    }

    /// Major/minor split of `rdev` (Linux encoding)
    pub fn device_numbers(&self) -> (u32, u32) {
        let major = ((self.rdev >> 32) & 0xffff_f000) | ((self.rdev >> 8) & 0x0000_0fff);
        let minor = ((self.rdev >> 12) & 0xffff_ff00) | (self.rdev & 0x0000_00ff);
        (major as u32, minor as u32)
    }
}
