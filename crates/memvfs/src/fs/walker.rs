//! Lazy depth-first traversal of an [`InMemoryFs`](crate::InMemoryFs) tree.
//!
//! # Consistency
//!
//! The walk is not a global snapshot. Each directory's entries are copied
//! under that directory's lock at the moment the walker descends into it,
//! and the copy drives recursion with no lock held. So:
//!
//! - every node that exists for the whole duration of the walk is yielded
//!   exactly once;
//! - a node created after its parent was copied, or removed before, may or
//!   may not be yielded;
//! - no directory is ever seen with an insert or remove half-applied.
//!
//! Callers doing work between `next()` calls never hold a tree lock, so a
//! slow consumer cannot block writers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::node::{DirNode, Node};
use super::traits::Metadata;
use crate::error::Result;
use crate::path::VfsPath;

/// One node yielded by a [`Walker`].
#[derive(Debug, Clone)]
pub struct WalkEntry {
    path: PathBuf,
    metadata: Metadata,
    depth: usize,
}

impl WalkEntry {
    /// Normalized absolute path of the node.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Metadata snapshot taken when the node was yielded.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Distance from the walk root (the root itself is 0).
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Final path component; empty for `/`.
    pub fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
    }
}

/// Depth-first, pre-order iterator over a subtree.
///
/// Directories are yielded before their children; siblings come in name
/// order. Call [`skip_current_dir`](Self::skip_current_dir) right after a
/// directory is yielded to prune it, and [`restart`](Self::restart) to walk
/// again from the root.
pub struct Walker {
    root: (VfsPath, Node),
    stack: Vec<(VfsPath, Node, usize)>,
    /// Directory most recently yielded; its entries are copied on the next
    /// call to `next` unless it was skipped.
    pending: Option<(VfsPath, Arc<DirNode>, usize)>,
}

impl Walker {
    pub(crate) fn new(path: VfsPath, node: Node) -> Self {
        let stack = vec![(path.clone(), node.clone(), 0)];
        Self {
            root: (path, node),
            stack,
            pending: None,
        }
    }

    /// Don't descend into the directory that was just yielded.
    ///
    /// Has no effect if the last entry was a file.
    pub fn skip_current_dir(&mut self) {
        self.pending = None;
    }

    /// Start over from the walk root.
    pub fn restart(&mut self) {
        let (path, node) = &self.root;
        self.stack = vec![(path.clone(), node.clone(), 0)];
        self.pending = None;
    }
}

impl Iterator for Walker {
    type Item = Result<WalkEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some((path, dir, depth)) = self.pending.take() {
            match dir.snapshot() {
                Ok(children) => {
                    for (name, child) in children.into_iter().rev() {
                        self.stack.push((path.join(&name), child, depth + 1));
                    }
                }
                Err(err) => return Some(Err(err)),
            }
        }

        let (path, node, depth) = self.stack.pop()?;
        let metadata = match node.metadata() {
            Ok(metadata) => metadata,
            Err(err) => return Some(Err(err)),
        };
        if let Node::Dir(dir) = node {
            self.pending = Some((path.clone(), dir, depth));
        }
        Some(Ok(WalkEntry {
            path: path.to_path_buf(),
            metadata,
            depth,
        }))
    }
}
