//! Tar header construction for a single walked object.

use crate::fs::metadata::{EntryKind, FileMetadata};
use crate::fs::walker::WalkEntry;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use tar::{EntryType, Header};

/// Append one header (and, for regular files, its payload) to `builder`
pub(super) fn append<W: Write>(builder: &mut tar::Builder<W>, entry: &WalkEntry) -> io::Result<()> {
    let meta = FileMetadata::from_metadata(&entry.metadata);
    let name = entry.archive_name();
    let mut header = base_header(&meta);

    match meta.kind {
        EntryKind::Regular => {
            header.set_entry_type(EntryType::Regular);
            header.set_size(meta.size);
            let file = File::open(&entry.path)?;
            let payload = ExactPayload::new(file, meta.size);
            builder.append_data(&mut header, &name, payload)
        }
        EntryKind::Directory => {
            header.set_entry_type(EntryType::Directory);
            builder.append_data(&mut header, &name, io::empty())
        }
        EntryKind::Symlink => {
            header.set_entry_type(EntryType::Symlink);
            let target = fs::read_link(&entry.path)?;
            builder.append_link(&mut header, &name, &target)
        }
        EntryKind::CharDevice | EntryKind::BlockDevice => {
            header.set_entry_type(if meta.kind == EntryKind::CharDevice {
                EntryType::Char
            } else {
                EntryType::Block
            });
            let (major, minor) = meta.device_numbers();
            header.set_device_major(major)?;
            header.set_device_minor(minor)?;
            builder.append_data(&mut header, &name, io::empty())
        }
        EntryKind::Fifo => {
            header.set_entry_type(EntryType::Fifo);
            builder.append_data(&mut header, &name, io::empty())
        }
        EntryKind::Socket => Err(io::Error::new(
            io::ErrorKind::Unsupported,
            format!("{}: sockets cannot be archived", entry.path.display()),
        )),
    }
}

/// Reads exactly `size` bytes; a file that shrank after it was stat'ed is an
/// error instead of a silently misaligned archive.
struct ExactPayload<R> {
    inner: io::Take<R>,
    remaining: u64,
}

impl<R: Read> ExactPayload<R> {
    fn new(inner: R, size: u64) -> Self {
        Self {
            inner: inner.take(size),
            remaining: size,
        }
    }
}

impl<R: Read> Read for ExactPayload<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n == 0 && self.remaining > 0 && !buf.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "file shrank while being archived",
            ));
        }
        self.remaining -= n as u64;
        Ok(n)
    }
}

fn base_header(meta: &FileMetadata) -> Header {
    let mut header = Header::new_gnu();
    header.set_mode(meta.mode);
    header.set_uid(meta.uid);
    header.set_gid(meta.gid);
    header.set_size(0);
    header.set_mtime(0);
    if let Some(gnu) = header.as_gnu_mut() {
        gnu.set_atime(0);
        gnu.set_ctime(0);
    }
    header
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_payload_reads_declared_size() {
        let mut payload = ExactPayload::new(&b"0123456789"[..], 4);
        let mut out = Vec::new();
        payload.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"0123");
    }

    #[test]
    fn test_exact_payload_rejects_short_source() {
        let mut payload = ExactPayload::new(&b"012"[..], 8);
        let mut out = Vec::new();
        let err = payload.read_to_end(&mut out).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
