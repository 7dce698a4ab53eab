//! Open file handles for the in-memory filesystem.

use async_trait::async_trait;
use std::io::SeekFrom;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use super::node::{Accounting, FileNode};
use super::traits::{FileHandle, Metadata, OpenOptions};
use crate::error::{Error, Result};
use crate::logging_impl::{sanitize_for_log, vfs_trace, vfs_warn};

/// Handle to a file in an [`InMemoryFs`](crate::InMemoryFs).
///
/// Holds a shared reference to the file node and a private cursor. Every
/// buffer access goes through the node's own lock, so handles on different
/// files never contend and handles on the same file serialize per call.
pub struct MemFile {
    file: Arc<FileNode>,
    accounting: Arc<Accounting>,
    cursor: u64,
    readable: bool,
    writable: bool,
    append: bool,
    closed: bool,
}

impl MemFile {
    pub(crate) fn new(
        file: Arc<FileNode>,
        accounting: Arc<Accounting>,
        options: &OpenOptions,
    ) -> Self {
        Self {
            file,
            accounting,
            cursor: 0,
            readable: options.read,
            writable: options.writable(),
            append: options.append,
            closed: false,
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(Error::Closed);
        }
        Ok(())
    }

    /// Current cursor position.
    pub fn position(&self) -> u64 {
        self.cursor
    }

    fn write_sync(&mut self, buf: &[u8]) -> Result<usize> {
        self.ensure_open()?;
        if !self.writable {
            return Err(Error::NotWritable);
        }
        if buf.is_empty() {
            return Ok(0);
        }

        let limits = self.accounting.limits();
        let mut state = self.file.lock()?;
        let old_len = state.data.len() as u64;
        let offset = if self.append { old_len } else { self.cursor };
        let end = offset
            .checked_add(buf.len() as u64)
            .ok_or_else(|| Error::InvalidInput("write ends past the largest offset".to_string()))?;
        let new_len = end.max(old_len);

        // Reject the whole call before touching the buffer.
        if let Err(err) = limits.check_file_size(new_len) {
            vfs_warn!(path = %sanitize_for_log(&self.path()), %err, "write rejected");
            return Err(err.into());
        }
        let start = to_index(offset)?;
        let stop = to_index(end)?;
        reserve_capacity(&mut state.data, stop)?;
        let growth = new_len - old_len;
        if growth > 0 && !state.unlinked {
            if let Err(err) = self.accounting.reserve_bytes(growth) {
                vfs_warn!(path = %sanitize_for_log(&self.path()), %err, "write rejected");
                return Err(err.into());
            }
        }

        if state.data.len() < stop {
            state.data.resize(stop, 0);
        }
        state.data[start..stop].copy_from_slice(buf);
        state.modified = SystemTime::now();
        drop(state);

        self.cursor = end;
        vfs_trace!(offset, len = buf.len(), "write");
        Ok(buf.len())
    }

    fn read_sync(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.ensure_open()?;
        if !self.readable {
            return Err(Error::NotReadable);
        }

        let state = self.file.lock()?;
        let len = state.data.len() as u64;
        if self.cursor >= len || buf.is_empty() {
            return Ok(0);
        }
        let start = self.cursor as usize;
        let n = buf.len().min(state.data.len() - start);
        buf[..n].copy_from_slice(&state.data[start..start + n]);
        drop(state);

        self.cursor += n as u64;
        vfs_trace!(offset = start, len = n, "read");
        Ok(n)
    }

    fn seek_sync(&mut self, pos: SeekFrom) -> Result<u64> {
        self.ensure_open()?;
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::Current(delta) => self.cursor.checked_add_signed(delta),
            SeekFrom::End(delta) => {
                let len = self.file.lock()?.data.len() as u64;
                len.checked_add_signed(delta)
            }
        };
        let target = target.ok_or_else(|| {
            Error::InvalidInput("seek to a negative or overflowing offset".to_string())
        })?;
        self.cursor = target;
        Ok(target)
    }

    fn set_len_sync(&mut self, size: u64) -> Result<()> {
        self.ensure_open()?;
        if !self.writable {
            return Err(Error::NotWritable);
        }
        self.accounting.limits().check_file_size(size)?;
        let new_len = to_index(size)?;

        let mut state = self.file.lock()?;
        let old_len = state.data.len() as u64;
        reserve_capacity(&mut state.data, new_len)?;
        if !state.unlinked {
            if size > old_len {
                self.accounting.reserve_bytes(size - old_len)?;
            } else {
                self.accounting.release_bytes(old_len - size);
            }
        }
        state.data.resize(new_len, 0);
        state.modified = SystemTime::now();
        Ok(())
    }
}

/// A file offset as a buffer index.
fn to_index(offset: u64) -> Result<usize> {
    usize::try_from(offset)
        .map_err(|_| Error::InvalidInput(format!("offset {offset} does not fit in memory")))
}

/// Make room for `len` bytes up front so a failed allocation surfaces as an
/// error and leaves the buffer untouched.
fn reserve_capacity(data: &mut Vec<u8>, len: usize) -> Result<()> {
    let additional = len.saturating_sub(data.len());
    data.try_reserve(additional)
        .map_err(|_| Error::Io(std::io::Error::from(std::io::ErrorKind::OutOfMemory)))
}

#[async_trait]
impl FileHandle for MemFile {
    async fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.write_sync(buf)
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.read_sync(buf)
    }

    async fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        self.seek_sync(pos)
    }

    async fn set_len(&mut self, size: u64) -> Result<()> {
        self.set_len_sync(size)
    }

    async fn stat(&self) -> Result<Metadata> {
        self.ensure_open()?;
        self.file.metadata()
    }

    fn path(&self) -> PathBuf {
        self.file.path().to_path_buf()
    }

    async fn close(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.closed = true;
        vfs_trace!(path = %sanitize_for_log(&self.path()), "close");
        Ok(())
    }
}
