//! Virtual filesystem for memvfs
//!
//! Provides an async filesystem trait and its in-memory implementation:
//! - `InMemoryFs`: Concurrent in-memory tree with per-node locking
//! - `MemFile`: Open file handle with a private cursor
//! - `Walker`: Lazy depth-first traversal with per-directory snapshots

mod handle;
mod limits;
mod memory;
mod node;
mod traits;
mod walker;

pub use handle::MemFile;
pub use limits::{FsLimitExceeded, FsLimits, FsUsage};
pub use memory::InMemoryFs;
pub use node::{DEFAULT_DIR_MODE, DEFAULT_FILE_MODE};
pub use traits::{
    DirEntry, FileHandle, FileSystem, FileType, Metadata, OpenOptions, WalkControl, WalkFn,
};
pub use walker::{WalkEntry, Walker};
