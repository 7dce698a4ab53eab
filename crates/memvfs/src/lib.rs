//! memvfs - Concurrent in-memory virtual filesystem
//!
//! A process-local tree of directories and files with a POSIX-like API
//! (mkdir, mkdir-all, create, open, write, read, stat, remove, walk) that is
//! safe to share across threads and tasks.
//!
//! Locking is per node: every directory guards its own entries and every
//! file its own bytes. Operations in unrelated subtrees never wait on each
//! other, and of several callers racing to create the same directory exactly
//! one wins.
//!
//! # Example
//!
//! ```rust
//! use memvfs::{FileSystem, InMemoryFs, WalkControl};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let fs: Arc<dyn FileSystem> = Arc::new(InMemoryFs::new());
//!
//!     fs.mkdir_all(Path::new("/test_dir/00"), 0o755).await?;
//!     let mut file = fs.create(Path::new("/test_dir/00/1.txt")).await?;
//!     file.write_all(b"000").await?;
//!     file.close().await?;
//!
//!     let mut files = 0;
//!     fs.walk(Path::new("/test_dir"), &mut |_path, meta| {
//!         if meta.is_file() {
//!             files += 1;
//!         }
//!         WalkControl::Continue
//!     })
//!     .await?;
//!     assert_eq!(files, 1);
//!     Ok(())
//! }
//! ```

mod error;
mod fs;
mod logging_impl;
mod path;

pub use async_trait::async_trait;
pub use error::{Error, Result};
pub use fs::{
    DEFAULT_DIR_MODE, DEFAULT_FILE_MODE, DirEntry, FileHandle, FileSystem, FileType,
    FsLimitExceeded, FsLimits, FsUsage, InMemoryFs, MemFile, Metadata, OpenOptions, WalkControl,
    WalkEntry, WalkFn, Walker,
};
pub use logging_impl::sanitize_for_log;
pub use path::VfsPath;
