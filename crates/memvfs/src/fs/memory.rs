//! In-memory filesystem implementation

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

use super::handle::MemFile;
use super::limits::{FsLimits, FsUsage};
use super::node::{Accounting, DEFAULT_FILE_MODE, DirNode, FileNode, MODE_MASK, Node};
use super::traits::{DirEntry, FileHandle, FileSystem, Metadata, OpenOptions, WalkControl, WalkFn};
use super::walker::Walker;
use crate::error::{Error, Result};
use crate::logging_impl::{sanitize_for_log, vfs_debug, vfs_trace, vfs_warn};
use crate::path::VfsPath;

/// In-memory filesystem.
///
/// A tree of directories and files rooted at `/`. Each directory carries its
/// own lock over its entries and each file its own lock over its bytes; there
/// is no tree-wide lock, so work in sibling subtrees never contends.
///
/// Instances are fully independent. Cloning the `Arc` shares one tree.
///
/// # Example
///
/// ```rust
/// use memvfs::{FileSystem, InMemoryFs};
/// use std::path::Path;
///
/// # #[tokio::main]
/// # async fn main() -> memvfs::Result<()> {
/// let fs = InMemoryFs::new();
/// fs.mkdir_all(Path::new("/data/logs"), 0o755).await?;
///
/// let mut file = fs.create(Path::new("/data/logs/app.log")).await?;
/// file.write_all(b"started\n").await?;
/// file.close().await?;
///
/// assert_eq!(fs.stat(Path::new("/data/logs/app.log")).await?.size, 8);
/// # Ok(())
/// # }
/// ```
pub struct InMemoryFs {
    root: Arc<DirNode>,
    accounting: Arc<Accounting>,
}

impl Default for InMemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryFs")
            .field("usage", &self.usage())
            .finish_non_exhaustive()
    }
}

impl InMemoryFs {
    /// Create a new, empty in-memory filesystem with default limits.
    pub fn new() -> Self {
        Self::with_limits(FsLimits::default())
    }

    /// Create a new, empty in-memory filesystem with custom limits.
    pub fn with_limits(limits: FsLimits) -> Self {
        Self {
            root: DirNode::new_root(),
            accounting: Arc::new(Accounting::new(limits)),
        }
    }

    /// The limits this filesystem enforces.
    pub fn limits(&self) -> &FsLimits {
        self.accounting.limits()
    }

    /// Current resource usage.
    pub fn usage(&self) -> FsUsage {
        self.accounting.usage()
    }

    /// Start a lazy depth-first walk at `root`.
    ///
    /// See [`Walker`] for the consistency guarantees.
    pub fn walker(&self, root: &Path) -> Result<Walker> {
        let path = VfsPath::new(root)?;
        let node = self.lookup(&path)?;
        Ok(Walker::new(path, node))
    }

    /// Normalize and check a path that is about to be created.
    fn checked(&self, path: &Path) -> Result<VfsPath> {
        let path = VfsPath::new(path)?;
        if let Err(err) = self.limits().validate_path(&path) {
            vfs_warn!(path = %sanitize_for_log(&path.to_path_buf()), %err, "path rejected");
            return Err(err.into());
        }
        Ok(path)
    }

    /// Resolve a path to its node.
    ///
    /// Each level takes its directory's read lock just long enough to clone
    /// the child pointer.
    fn lookup(&self, path: &VfsPath) -> Result<Node> {
        self.lookup_prefix(path.components(), path)
    }

    fn lookup_prefix(&self, components: &[String], target: &VfsPath) -> Result<Node> {
        let mut current = Node::Dir(Arc::clone(&self.root));
        for name in components {
            let dir = match current {
                Node::Dir(dir) => dir,
                Node::File(_) => return Err(Error::NotADirectory(target.to_path_buf())),
            };
            current = dir
                .child(name)?
                .ok_or_else(|| Error::NotFound(target.to_path_buf()))?;
        }
        Ok(current)
    }

    /// Resolve the directory that holds the last component of `path`.
    ///
    /// Returns `None` for the root.
    fn lookup_parent<'p>(&self, path: &'p VfsPath) -> Result<Option<(Arc<DirNode>, &'p str)>> {
        let Some((name, ancestors)) = path.components().split_last() else {
            return Ok(None);
        };
        match self.lookup_prefix(ancestors, path)? {
            Node::Dir(dir) => Ok(Some((dir, name.as_str()))),
            Node::File(_) => Err(Error::NotADirectory(path.to_path_buf())),
        }
    }

    fn open_sync(&self, path: &Path, options: &OpenOptions) -> Result<MemFile> {
        options.validate()?;
        let creating = options.create || options.create_new;
        let path = if creating {
            self.checked(path)?
        } else {
            VfsPath::new(path)?
        };

        if !creating {
            let file = match self.lookup(&path)? {
                Node::Dir(_) => return Err(Error::IsADirectory(path.to_path_buf())),
                Node::File(file) => file,
            };
            if options.truncate {
                file.truncate(&self.accounting)?;
            }
            vfs_trace!(path = %sanitize_for_log(&path.to_path_buf()), "open");
            return Ok(MemFile::new(file, Arc::clone(&self.accounting), options));
        }

        let Some((parent, name)) = self.lookup_parent(&path)? else {
            return Err(Error::IsADirectory(path.to_path_buf()));
        };
        let file = parent.mutate(&path, |state| match state.entries.get(name) {
            Some(Node::Dir(_)) => Err(Error::IsADirectory(path.to_path_buf())),
            Some(Node::File(_)) if options.create_new => {
                Err(Error::AlreadyExists(path.to_path_buf()))
            }
            Some(Node::File(file)) => {
                if options.truncate {
                    file.truncate(&self.accounting)?;
                }
                Ok(Arc::clone(file))
            }
            None => {
                self.accounting.reserve_file()?;
                let file = FileNode::new(&parent, name, DEFAULT_FILE_MODE);
                state
                    .entries
                    .insert(name.to_string(), Node::File(Arc::clone(&file)));
                state.touch();
                vfs_debug!(path = %sanitize_for_log(&path.to_path_buf()), "file created");
                Ok(file)
            }
        })?;

        Ok(MemFile::new(file, Arc::clone(&self.accounting), options))
    }

    fn mkdir_sync(&self, path: &Path, mode: u32) -> Result<()> {
        let path = self.checked(path)?;
        let Some((parent, name)) = self.lookup_parent(&path)? else {
            return Err(Error::AlreadyExists(path.to_path_buf()));
        };

        parent.mutate(&path, |state| {
            if state.entries.contains_key(name) {
                return Err(Error::AlreadyExists(path.to_path_buf()));
            }
            self.accounting.reserve_dir()?;
            let dir = DirNode::new_child(&parent, name, mode);
            state.entries.insert(name.to_string(), Node::Dir(dir));
            state.touch();
            Ok(())
        })?;

        vfs_debug!(path = %sanitize_for_log(&path.to_path_buf()), mode, "mkdir");
        Ok(())
    }

    fn mkdir_all_sync(&self, path: &Path, mode: u32) -> Result<()> {
        let path = self.checked(path)?;
        let mut dir = Arc::clone(&self.root);

        // One independent insert-if-absent per level; no multi-level
        // transaction.
        for name in path.components() {
            let next = match dir.child(name)? {
                Some(Node::Dir(child)) => child,
                Some(Node::File(_)) => return Err(Error::NotADirectory(path.to_path_buf())),
                None => dir.mutate(&path, |state| match state.entries.get(name) {
                    Some(Node::Dir(child)) => Ok(Arc::clone(child)),
                    Some(Node::File(_)) => Err(Error::NotADirectory(path.to_path_buf())),
                    None => {
                        self.accounting.reserve_dir()?;
                        let child = DirNode::new_child(&dir, name, mode);
                        state
                            .entries
                            .insert(name.to_string(), Node::Dir(Arc::clone(&child)));
                        state.touch();
                        vfs_debug!(path = %sanitize_for_log(&child.path().to_path_buf()), mode, "mkdir");
                        Ok(child)
                    }
                })?,
            };
            dir = next;
        }
        Ok(())
    }

    fn remove_sync(&self, path: &Path) -> Result<()> {
        let path = VfsPath::new(path)?;
        let Some((parent, name)) = self.lookup_parent(&path)? else {
            return Err(Error::InvalidPath("cannot remove the root directory".to_string()));
        };

        parent.mutate(&path, |state| {
            match state.entries.get(name).cloned() {
                None => return Err(Error::NotFound(path.to_path_buf())),
                Some(Node::File(file)) => {
                    state.entries.remove(name);
                    file.unlink(&self.accounting)?;
                }
                Some(Node::Dir(dir)) => {
                    let mut child = dir.write_state()?;
                    if !child.entries.is_empty() {
                        return Err(Error::NotEmpty(path.to_path_buf()));
                    }
                    child.removed = true;
                    drop(child);
                    state.entries.remove(name);
                    self.accounting.release_dir();
                }
            }
            state.touch();
            Ok(())
        })?;

        vfs_debug!(path = %sanitize_for_log(&path.to_path_buf()), "removed");
        Ok(())
    }

    fn remove_all_sync(&self, path: &Path) -> Result<()> {
        let path = VfsPath::new(path)?;
        let detached: Vec<Node> = match self.lookup_parent(&path) {
            Ok(Some((parent, name))) => {
                let removed = parent.mutate(&path, |state| {
                    let node = state.entries.remove(name);
                    if node.is_some() {
                        state.touch();
                    }
                    Ok(node)
                });
                match removed {
                    Ok(node) => node.into_iter().collect(),
                    Err(err) if err.is_not_found() => return Ok(()),
                    Err(err) => return Err(err),
                }
            }
            // The root stays; everything below it goes.
            Ok(None) => {
                let mut state = self.root.write_state()?;
                let entries = std::mem::take(&mut state.entries);
                state.touch();
                entries.into_values().collect()
            }
            Err(err) if err.is_not_found() => return Ok(()),
            Err(err) => return Err(err),
        };

        self.tear_down(detached)?;
        vfs_debug!(path = %sanitize_for_log(&path.to_path_buf()), "removed recursively");
        Ok(())
    }

    /// Release a detached subtree.
    ///
    /// Each directory is marked removed and emptied under its own lock, so
    /// an insert racing with the teardown either lands before the entries
    /// are taken (and is torn down too) or fails with `NotFound`.
    fn tear_down(&self, mut pending: Vec<Node>) -> Result<()> {
        while let Some(node) = pending.pop() {
            match node {
                Node::File(file) => file.unlink(&self.accounting)?,
                Node::Dir(dir) => {
                    let mut state = dir.write_state()?;
                    state.removed = true;
                    let entries = std::mem::take(&mut state.entries);
                    drop(state);
                    self.accounting.release_dir();
                    pending.extend(entries.into_values());
                }
            }
        }
        Ok(())
    }

    fn read_dir_sync(&self, path: &Path) -> Result<Vec<DirEntry>> {
        let path = VfsPath::new(path)?;
        let dir = match self.lookup(&path)? {
            Node::Dir(dir) => dir,
            Node::File(_) => return Err(Error::NotADirectory(path.to_path_buf())),
        };

        let mut entries = Vec::new();
        for (name, node) in dir.snapshot()? {
            entries.push(DirEntry {
                name,
                metadata: node.metadata()?,
            });
        }
        Ok(entries)
    }

    fn chmod_sync(&self, path: &Path, mode: u32) -> Result<()> {
        let path = VfsPath::new(path)?;
        match self.lookup(&path)? {
            Node::Dir(dir) => dir.write_state()?.mode = mode & MODE_MASK,
            Node::File(file) => file.lock()?.mode = mode & MODE_MASK,
        }
        Ok(())
    }

    fn walk_sync(&self, root: &Path, visit: &mut WalkFn<'_>) -> Result<()> {
        let mut walker = self.walker(root)?;
        while let Some(entry) = walker.next() {
            let entry = entry?;
            match visit(entry.path(), entry.metadata()) {
                WalkControl::Continue => {}
                WalkControl::SkipSubtree => walker.skip_current_dir(),
                WalkControl::Abort => break,
            }
        }
        Ok(())
    }
}

#[async_trait]
impl FileSystem for InMemoryFs {
    async fn mkdir(&self, path: &Path, mode: u32) -> Result<()> {
        self.mkdir_sync(path, mode)
    }

    async fn mkdir_all(&self, path: &Path, mode: u32) -> Result<()> {
        self.mkdir_all_sync(path, mode)
    }

    async fn create(&self, path: &Path) -> Result<Box<dyn FileHandle>> {
        let options = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true);
        Ok(Box::new(self.open_sync(path, &options)?))
    }

    async fn open(&self, path: &Path) -> Result<Box<dyn FileHandle>> {
        let options = OpenOptions::new().read(true);
        Ok(Box::new(self.open_sync(path, &options)?))
    }

    async fn open_file(&self, path: &Path, options: &OpenOptions) -> Result<Box<dyn FileHandle>> {
        Ok(Box::new(self.open_sync(path, options)?))
    }

    async fn remove(&self, path: &Path) -> Result<()> {
        self.remove_sync(path)
    }

    async fn remove_all(&self, path: &Path) -> Result<()> {
        self.remove_all_sync(path)
    }

    async fn stat(&self, path: &Path) -> Result<Metadata> {
        let path = VfsPath::new(path)?;
        self.lookup(&path)?.metadata()
    }

    async fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>> {
        self.read_dir_sync(path)
    }

    async fn chmod(&self, path: &Path, mode: u32) -> Result<()> {
        self.chmod_sync(path, mode)
    }

    async fn walk(&self, root: &Path, visit: &mut WalkFn<'_>) -> Result<()> {
        self.walk_sync(root, visit)
    }
}
