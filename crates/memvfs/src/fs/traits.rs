//! Filesystem trait definitions

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::{Error, Result};

/// Visitor callback for [`FileSystem::walk`].
///
/// Receives the path of each visited node and a metadata snapshot.
pub type WalkFn<'a> = dyn FnMut(&Path, &Metadata) -> WalkControl + Send + 'a;

/// Async filesystem capability trait.
///
/// This is the contract the in-memory filesystem satisfies; other backings
/// (a host directory, a remote store) implement it the same way and can be
/// swapped in behind `Arc<dyn FileSystem>`.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Create a single directory.
    ///
    /// The parent must exist. Fails with `AlreadyExists` if the name is
    /// taken; of several concurrent calls for one path exactly one succeeds.
    async fn mkdir(&self, path: &Path, mode: u32) -> Result<()>;

    /// Create a directory and any missing ancestors.
    ///
    /// Existing directories along the way are fine; an existing file is
    /// `NotADirectory`.
    async fn mkdir_all(&self, path: &Path, mode: u32) -> Result<()>;

    /// Create a file, truncating it if it already exists.
    ///
    /// Returns a read/write handle positioned at offset 0.
    async fn create(&self, path: &Path) -> Result<Box<dyn FileHandle>>;

    /// Open an existing file for reading.
    async fn open(&self, path: &Path) -> Result<Box<dyn FileHandle>>;

    /// Open a file with explicit options.
    async fn open_file(&self, path: &Path, options: &OpenOptions) -> Result<Box<dyn FileHandle>>;

    /// Remove a file or an empty directory.
    async fn remove(&self, path: &Path) -> Result<()>;

    /// Remove a path and everything below it. A missing path is not an error.
    async fn remove_all(&self, path: &Path) -> Result<()>;

    /// Get file metadata.
    async fn stat(&self, path: &Path) -> Result<Metadata>;

    /// Read directory entries, sorted by name.
    async fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>>;

    /// Check if a path exists.
    async fn exists(&self, path: &Path) -> Result<bool> {
        match self.stat(path).await {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Change permission bits.
    async fn chmod(&self, path: &Path, mode: u32) -> Result<()>;

    /// Depth-first walk starting at `root`.
    ///
    /// `visit` runs once per node, a directory before its children.
    /// Returning [`WalkControl::SkipSubtree`] for a directory prunes it;
    /// [`WalkControl::Abort`] stops the walk, which then returns `Ok(())`.
    ///
    /// The default implementation is built on [`stat`](Self::stat) and
    /// [`read_dir`](Self::read_dir). It is not a global snapshot: entries
    /// created or removed while the walk is running may or may not be seen.
    async fn walk(&self, root: &Path, visit: &mut WalkFn<'_>) -> Result<()> {
        let root_meta = self.stat(root).await?;
        let mut stack = vec![(root.to_path_buf(), root_meta)];

        while let Some((path, metadata)) = stack.pop() {
            match visit(&path, &metadata) {
                WalkControl::Abort => return Ok(()),
                WalkControl::SkipSubtree => continue,
                WalkControl::Continue => {}
            }
            if !metadata.is_dir() {
                continue;
            }

            let mut entries = match self.read_dir(&path).await {
                Ok(entries) => entries,
                // Removed after we saw it.
                Err(err) if err.is_not_found() => continue,
                Err(err) => return Err(err),
            };
            entries.sort_by(|a, b| b.name.cmp(&a.name));
            for entry in entries {
                stack.push((path.join(&entry.name), entry.metadata));
            }
        }
        Ok(())
    }
}

/// An open file.
///
/// Each handle owns a private cursor. A handle belongs to one logical
/// caller; different handles on the same file may be used concurrently.
#[async_trait]
pub trait FileHandle: Send + Sync {
    /// Write `buf` at the cursor (or at end of file in append mode).
    ///
    /// The whole buffer is applied atomically with respect to other writers
    /// of the same file.
    async fn write(&mut self, buf: &[u8]) -> Result<usize>;

    /// Read into `buf` from the cursor. `Ok(0)` signals end of file.
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Move the cursor.
    async fn seek(&mut self, pos: SeekFrom) -> Result<u64>;

    /// Truncate or zero-extend the file to `size` bytes.
    async fn set_len(&mut self, size: u64) -> Result<()>;

    /// Metadata of the underlying file.
    async fn stat(&self) -> Result<Metadata>;

    /// Path the handle was opened with.
    fn path(&self) -> PathBuf;

    /// Release the handle. Any later call fails with `Closed`.
    async fn close(&mut self) -> Result<()>;

    /// Write the whole buffer.
    async fn write_all(&mut self, mut buf: &[u8]) -> Result<()> {
        while !buf.is_empty() {
            let n = self.write(buf).await?;
            if n == 0 {
                return Err(Error::Io(std::io::Error::from(
                    std::io::ErrorKind::WriteZero,
                )));
            }
            buf = &buf[n..];
        }
        Ok(())
    }

    /// Read from the cursor to end of file, appending to `out`.
    async fn read_to_end(&mut self, out: &mut Vec<u8>) -> Result<usize> {
        let mut chunk = [0u8; 4096];
        let mut total = 0;
        loop {
            let n = self.read(&mut chunk).await?;
            if n == 0 {
                return Ok(total);
            }
            out.extend_from_slice(&chunk[..n]);
            total += n;
        }
    }
}

/// What a walk should do after visiting a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkControl {
    /// Keep going; descend into directories.
    Continue,
    /// Don't descend into this directory. Same as `Continue` for files.
    SkipSubtree,
    /// Stop the walk.
    Abort,
}

/// Options for [`FileSystem::open_file`], mirroring `std::fs::OpenOptions`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpenOptions {
    pub(crate) read: bool,
    pub(crate) write: bool,
    pub(crate) append: bool,
    pub(crate) truncate: bool,
    pub(crate) create: bool,
    pub(crate) create_new: bool,
}

impl OpenOptions {
    /// All flags off.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow reading.
    pub fn read(mut self, read: bool) -> Self {
        self.read = read;
        self
    }

    /// Allow writing.
    pub fn write(mut self, write: bool) -> Self {
        self.write = write;
        self
    }

    /// Every write goes to the end of the file. Implies `write`.
    pub fn append(mut self, append: bool) -> Self {
        self.append = append;
        self
    }

    /// Truncate an existing file to zero length on open.
    pub fn truncate(mut self, truncate: bool) -> Self {
        self.truncate = truncate;
        self
    }

    /// Create the file if it is missing.
    pub fn create(mut self, create: bool) -> Self {
        self.create = create;
        self
    }

    /// Create the file, failing with `AlreadyExists` if it is present.
    pub fn create_new(mut self, create_new: bool) -> Self {
        self.create_new = create_new;
        self
    }

    pub(crate) fn writable(&self) -> bool {
        self.write || self.append
    }

    /// Reject flag combinations that make no sense.
    pub fn validate(&self) -> Result<()> {
        if !self.read && !self.writable() {
            return Err(Error::InvalidInput(
                "open requires read, write or append access".to_string(),
            ));
        }
        if (self.truncate || self.create || self.create_new) && !self.writable() {
            return Err(Error::InvalidInput(
                "truncate and create require write access".to_string(),
            ));
        }
        if self.truncate && self.append {
            return Err(Error::InvalidInput(
                "truncate and append are mutually exclusive".to_string(),
            ));
        }
        Ok(())
    }
}

/// File metadata.
#[derive(Debug, Clone)]
pub struct Metadata {
    /// File type
    pub file_type: FileType,
    /// File size in bytes (0 for directories)
    pub size: u64,
    /// Permission bits
    pub mode: u32,
    /// Last modification time
    pub modified: SystemTime,
    /// Creation time
    pub created: SystemTime,
}

impl Metadata {
    /// Check if this is a directory.
    pub fn is_dir(&self) -> bool {
        self.file_type.is_dir()
    }

    /// Check if this is a file.
    pub fn is_file(&self) -> bool {
        self.file_type.is_file()
    }
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            file_type: FileType::File,
            size: 0,
            mode: 0o644,
            modified: SystemTime::now(),
            created: SystemTime::now(),
        }
    }
}

/// File type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// Regular file
    File,
    /// Directory
    Directory,
}

impl FileType {
    /// Check if this is a file.
    pub fn is_file(&self) -> bool {
        matches!(self, FileType::File)
    }

    /// Check if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, FileType::Directory)
    }
}

/// Directory entry.
#[derive(Debug, Clone)]
pub struct DirEntry {
    /// Entry name (not full path)
    pub name: String,
    /// Entry metadata
    pub metadata: Metadata,
}
