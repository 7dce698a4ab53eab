//! Directory tree nodes.
//!
//! Ownership flows strictly root to leaf: a directory's entry map holds the
//! only owning `Arc` of each child that the tree itself keeps. Children point
//! back at their parent through a `Weak`, used only to rebuild paths.
//!
//! Locking is per node. A directory's `RwLock` guards its entry map and its
//! own metadata, nothing else. A file's `Mutex` guards its buffer and
//! metadata. When two locks are held at once they are always taken top-down
//! (parent before child, directory before file).

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use std::time::SystemTime;

use super::limits::{FsLimitExceeded, FsLimits, FsUsage};
use super::traits::{FileType, Metadata};
use crate::error::{Error, Result};
use crate::path::VfsPath;

/// Default permission bits for new directories.
pub const DEFAULT_DIR_MODE: u32 = 0o755;

/// Default permission bits for new files.
pub const DEFAULT_FILE_MODE: u32 = 0o644;

/// Bits of a caller-supplied mode that are kept.
pub(crate) const MODE_MASK: u32 = 0o7777;

/// A directory or file in the tree.
#[derive(Clone)]
pub(crate) enum Node {
    Dir(Arc<DirNode>),
    File(Arc<FileNode>),
}

impl Node {
    /// Snapshot metadata under the node's own lock.
    pub(crate) fn metadata(&self) -> Result<Metadata> {
        match self {
            Node::Dir(dir) => dir.metadata(),
            Node::File(file) => file.metadata(),
        }
    }
}

pub(crate) struct DirNode {
    name: String,
    parent: Weak<DirNode>,
    state: RwLock<DirState>,
}

pub(crate) struct DirState {
    pub(crate) entries: BTreeMap<String, Node>,
    pub(crate) mode: u32,
    created: SystemTime,
    modified: SystemTime,
    /// Set once the directory is unlinked. Inserts into a removed directory
    /// fail, so nothing can be attached below a detached subtree.
    pub(crate) removed: bool,
}

impl DirState {
    fn new(mode: u32) -> Self {
        let now = SystemTime::now();
        Self {
            entries: BTreeMap::new(),
            mode: mode & MODE_MASK,
            created: now,
            modified: now,
            removed: false,
        }
    }

    /// Record a change to the entry map.
    pub(crate) fn touch(&mut self) {
        self.modified = SystemTime::now();
    }
}

impl DirNode {
    pub(crate) fn new_root() -> Arc<Self> {
        Arc::new(Self {
            name: String::new(),
            parent: Weak::new(),
            state: RwLock::new(DirState::new(DEFAULT_DIR_MODE)),
        })
    }

    pub(crate) fn new_child(parent: &Arc<DirNode>, name: &str, mode: u32) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            parent: Arc::downgrade(parent),
            state: RwLock::new(DirState::new(mode)),
        })
    }

    pub(crate) fn read_state(&self) -> Result<RwLockReadGuard<'_, DirState>> {
        self.state
            .read()
            .map_err(|_| Error::Internal("directory lock poisoned".to_string()))
    }

    pub(crate) fn write_state(&self) -> Result<RwLockWriteGuard<'_, DirState>> {
        self.state
            .write()
            .map_err(|_| Error::Internal("directory lock poisoned".to_string()))
    }

    /// Look up one child under a brief read lock.
    pub(crate) fn child(&self, name: &str) -> Result<Option<Node>> {
        Ok(self.read_state()?.entries.get(name).cloned())
    }

    /// Apply `f` to the entry map while holding the write lock.
    ///
    /// This is the only way the tree changes shape. `f` runs atomically with
    /// respect to every other mutator and lister of this directory. Fails
    /// with `NotFound(target)` if the directory was removed.
    pub(crate) fn mutate<R>(
        &self,
        target: &VfsPath,
        f: impl FnOnce(&mut DirState) -> Result<R>,
    ) -> Result<R> {
        let mut state = self.write_state()?;
        if state.removed {
            return Err(Error::NotFound(target.to_path_buf()));
        }
        f(&mut state)
    }

    /// Copy the current entries so they can be visited without the lock.
    pub(crate) fn snapshot(&self) -> Result<Vec<(String, Node)>> {
        let state = self.read_state()?;
        Ok(state
            .entries
            .iter()
            .map(|(name, node)| (name.clone(), node.clone()))
            .collect())
    }

    pub(crate) fn metadata(&self) -> Result<Metadata> {
        let state = self.read_state()?;
        Ok(Metadata {
            file_type: FileType::Directory,
            size: 0,
            mode: state.mode,
            modified: state.modified,
            created: state.created,
        })
    }

    /// Rebuild this directory's path by following parent links.
    pub(crate) fn path(&self) -> VfsPath {
        build_path(&self.name, &self.parent)
    }
}

pub(crate) struct FileNode {
    name: String,
    parent: Weak<DirNode>,
    state: Mutex<FileState>,
}

pub(crate) struct FileState {
    pub(crate) data: Vec<u8>,
    pub(crate) mode: u32,
    created: SystemTime,
    pub(crate) modified: SystemTime,
    /// Set once the file is removed from its directory. Open handles keep
    /// working, but the bytes no longer count toward usage.
    pub(crate) unlinked: bool,
}

impl FileNode {
    pub(crate) fn new(parent: &Arc<DirNode>, name: &str, mode: u32) -> Arc<Self> {
        let now = SystemTime::now();
        Arc::new(Self {
            name: name.to_string(),
            parent: Arc::downgrade(parent),
            state: Mutex::new(FileState {
                data: Vec::new(),
                mode: mode & MODE_MASK,
                created: now,
                modified: now,
                unlinked: false,
            }),
        })
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, FileState>> {
        self.state
            .lock()
            .map_err(|_| Error::Internal("file lock poisoned".to_string()))
    }

    pub(crate) fn metadata(&self) -> Result<Metadata> {
        let state = self.lock()?;
        Ok(Metadata {
            file_type: FileType::File,
            size: state.data.len() as u64,
            mode: state.mode,
            modified: state.modified,
            created: state.created,
        })
    }

    /// Drop the file's contents.
    pub(crate) fn truncate(&self, accounting: &Accounting) -> Result<()> {
        let mut state = self.lock()?;
        if !state.unlinked {
            accounting.release_bytes(state.data.len() as u64);
        }
        state.data.clear();
        state.modified = SystemTime::now();
        Ok(())
    }

    /// Mark the file as removed and give its usage back.
    pub(crate) fn unlink(&self, accounting: &Accounting) -> Result<()> {
        let mut state = self.lock()?;
        if !state.unlinked {
            state.unlinked = true;
            accounting.release_bytes(state.data.len() as u64);
            accounting.release_file();
        }
        Ok(())
    }

    pub(crate) fn path(&self) -> VfsPath {
        build_path(&self.name, &self.parent)
    }
}

fn build_path(name: &str, parent: &Weak<DirNode>) -> VfsPath {
    let mut names = vec![name.to_string()];
    let mut cursor = parent.upgrade();
    while let Some(dir) = cursor {
        if dir.name.is_empty() {
            break;
        }
        names.push(dir.name.clone());
        cursor = dir.parent.upgrade();
    }
    names.reverse();
    VfsPath::parse(&names.join("/"))
}

/// Resource counters shared by the tree and every open handle.
///
/// Reservations are compare-and-swap loops on atomics, so enforcing limits
/// never serializes unrelated operations.
#[derive(Debug)]
pub(crate) struct Accounting {
    limits: FsLimits,
    total_bytes: AtomicU64,
    file_count: AtomicU64,
    dir_count: AtomicU64,
}

impl Accounting {
    pub(crate) fn new(limits: FsLimits) -> Self {
        Self {
            limits,
            total_bytes: AtomicU64::new(0),
            file_count: AtomicU64::new(0),
            dir_count: AtomicU64::new(0),
        }
    }

    pub(crate) fn limits(&self) -> &FsLimits {
        &self.limits
    }

    pub(crate) fn usage(&self) -> FsUsage {
        FsUsage::new(
            self.total_bytes.load(Ordering::Acquire),
            self.file_count.load(Ordering::Acquire),
            self.dir_count.load(Ordering::Acquire),
        )
    }

    pub(crate) fn reserve_bytes(&self, additional: u64) -> std::result::Result<(), FsLimitExceeded> {
        reserve(&self.total_bytes, additional, |current| {
            self.limits.check_total_bytes(current, additional)
        })
    }

    pub(crate) fn release_bytes(&self, amount: u64) {
        release(&self.total_bytes, amount);
    }

    pub(crate) fn reserve_file(&self) -> std::result::Result<(), FsLimitExceeded> {
        reserve(&self.file_count, 1, |current| {
            self.limits.check_file_count(current)
        })
    }

    pub(crate) fn release_file(&self) {
        release(&self.file_count, 1);
    }

    pub(crate) fn reserve_dir(&self) -> std::result::Result<(), FsLimitExceeded> {
        reserve(&self.dir_count, 1, |current| {
            self.limits.check_dir_count(current)
        })
    }

    pub(crate) fn release_dir(&self) {
        release(&self.dir_count, 1);
    }
}

fn reserve(
    counter: &AtomicU64,
    amount: u64,
    check: impl Fn(u64) -> std::result::Result<(), FsLimitExceeded>,
) -> std::result::Result<(), FsLimitExceeded> {
    let mut current = counter.load(Ordering::Acquire);
    loop {
        check(current)?;
        match counter.compare_exchange_weak(
            current,
            current.saturating_add(amount),
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => return Ok(()),
            Err(actual) => current = actual,
        }
    }
}

fn release(counter: &AtomicU64, amount: u64) {
    // Never wraps: every release pairs with an earlier reservation.
    let _ = counter.fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
        Some(current.saturating_sub(amount))
    });
}
