//! Resource limits for an [`InMemoryFs`](crate::InMemoryFs).
//!
//! `FsLimits` is plain configuration: build it in code or deserialize it
//! from a config file (missing keys fall back to the defaults). The tree
//! enforces it at two points:
//!
//! - when a name is about to be created, [`FsLimits::validate_path`] checks
//!   the normalized path;
//! - when bytes or nodes are added, the shared usage counters are reserved
//!   against the `check_*` methods with compare-and-swap, so no check ever
//!   needs a tree-wide lock.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::path::VfsPath;

/// Default cap on bytes held by all files together: 1GB
pub const DEFAULT_MAX_TOTAL_BYTES: u64 = 1_000_000_000;

/// Default cap on one file: 100MB
pub const DEFAULT_MAX_FILE_SIZE: u64 = 100_000_000;

/// Default cap on live files
pub const DEFAULT_MAX_FILE_COUNT: u64 = 1_000_000;

/// Default cap on live directories (the root is free)
pub const DEFAULT_MAX_DIR_COUNT: u64 = 1_000_000;

/// Default cap on nesting below the root
pub const DEFAULT_MAX_PATH_DEPTH: usize = 256;

/// Default cap on one name, in bytes
pub const DEFAULT_MAX_FILENAME_LENGTH: usize = 255;

/// Default cap on a rendered path, in bytes
pub const DEFAULT_MAX_PATH_LENGTH: usize = 4096;

/// Resource limits.
///
/// ```rust
/// use memvfs::{FsLimits, InMemoryFs};
///
/// let fs = InMemoryFs::with_limits(
///     FsLimits::new()
///         .max_total_bytes(64 << 20)
///         .max_dir_count(10_000),
/// );
/// assert_eq!(fs.limits().max_dir_count, 10_000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FsLimits {
    /// Bytes across every linked file.
    pub max_total_bytes: u64,
    /// Bytes in any single file.
    pub max_file_size: u64,
    /// Linked files.
    pub max_file_count: u64,
    /// Linked directories, root excluded.
    pub max_dir_count: u64,
    /// Components in a normalized path.
    pub max_path_depth: usize,
    /// Bytes in one component.
    pub max_filename_length: usize,
    /// Bytes in the rendered normalized path.
    pub max_path_length: usize,
}

impl Default for FsLimits {
    fn default() -> Self {
        Self {
            max_total_bytes: DEFAULT_MAX_TOTAL_BYTES,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_file_count: DEFAULT_MAX_FILE_COUNT,
            max_dir_count: DEFAULT_MAX_DIR_COUNT,
            max_path_depth: DEFAULT_MAX_PATH_DEPTH,
            max_filename_length: DEFAULT_MAX_FILENAME_LENGTH,
            max_path_length: DEFAULT_MAX_PATH_LENGTH,
        }
    }
}

impl FsLimits {
    /// The default limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// No caps at all. Only for trusted callers.
    pub fn unlimited() -> Self {
        Self {
            max_total_bytes: u64::MAX,
            max_file_size: u64::MAX,
            max_file_count: u64::MAX,
            max_dir_count: u64::MAX,
            max_path_depth: usize::MAX,
            max_filename_length: usize::MAX,
            max_path_length: usize::MAX,
        }
    }

    /// Cap the bytes held by all files together.
    ///
    /// ```rust
    /// use memvfs::FsLimits;
    ///
    /// let limits = FsLimits::new().max_total_bytes(10 << 20);
    /// assert!(limits.check_total_bytes(10 << 20, 1).is_err());
    /// ```
    pub fn max_total_bytes(mut self, bytes: u64) -> Self {
        self.max_total_bytes = bytes;
        self
    }

    /// Cap the size any one file may grow to.
    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    /// Cap the number of linked files.
    pub fn max_file_count(mut self, count: u64) -> Self {
        self.max_file_count = count;
        self
    }

    /// Cap the number of linked directories. The root is not counted.
    pub fn max_dir_count(mut self, count: u64) -> Self {
        self.max_dir_count = count;
        self
    }

    /// Cap how many components a created path may have.
    ///
    /// ```rust
    /// use memvfs::{FsLimits, VfsPath};
    ///
    /// let limits = FsLimits::new().max_path_depth(2);
    /// assert!(limits.validate_path(&VfsPath::parse("/a/b")).is_ok());
    /// assert!(limits.validate_path(&VfsPath::parse("/a/b/c")).is_err());
    /// ```
    pub fn max_path_depth(mut self, depth: usize) -> Self {
        self.max_path_depth = depth;
        self
    }

    /// Cap the length in bytes of any one name.
    pub fn max_filename_length(mut self, len: usize) -> Self {
        self.max_filename_length = len;
        self
    }

    /// Cap the length in bytes of a created path, rendered as `/a/b/c`.
    pub fn max_path_length(mut self, len: usize) -> Self {
        self.max_path_length = len;
        self
    }

    /// Check a normalized path before anything is created at it.
    ///
    /// Only names that are about to be inserted need this; lookups of
    /// existing entries skip it.
    pub fn validate_path(&self, path: &VfsPath) -> Result<(), FsLimitExceeded> {
        let depth = path.depth();
        if depth > self.max_path_depth {
            return Err(FsLimitExceeded::PathTooDeep {
                depth,
                limit: self.max_path_depth,
            });
        }

        // Rendered length: one separator before every component.
        let length: usize = path.components().iter().map(|name| name.len() + 1).sum();
        if length > self.max_path_length {
            return Err(FsLimitExceeded::PathTooLong {
                length,
                limit: self.max_path_length,
            });
        }

        for name in path.components() {
            if name.len() > self.max_filename_length {
                return Err(FsLimitExceeded::FilenameTooLong {
                    length: name.len(),
                    limit: self.max_filename_length,
                });
            }
            check_name_chars(name)?;
        }
        Ok(())
    }

    /// `additional` more bytes on top of `current`.
    pub fn check_total_bytes(&self, current: u64, additional: u64) -> Result<(), FsLimitExceeded> {
        match current.checked_add(additional) {
            Some(total) if total <= self.max_total_bytes => Ok(()),
            _ => Err(FsLimitExceeded::TotalBytes {
                current,
                additional,
                limit: self.max_total_bytes,
            }),
        }
    }

    /// A file growing to `size` bytes.
    pub fn check_file_size(&self, size: u64) -> Result<(), FsLimitExceeded> {
        if size > self.max_file_size {
            return Err(FsLimitExceeded::FileSize {
                size,
                limit: self.max_file_size,
            });
        }
        Ok(())
    }

    /// One more file when `current` exist.
    pub fn check_file_count(&self, current: u64) -> Result<(), FsLimitExceeded> {
        if current >= self.max_file_count {
            return Err(FsLimitExceeded::FileCount {
                current,
                limit: self.max_file_count,
            });
        }
        Ok(())
    }

    /// One more directory when `current` exist.
    pub fn check_dir_count(&self, current: u64) -> Result<(), FsLimitExceeded> {
        if current >= self.max_dir_count {
            return Err(FsLimitExceeded::DirCount {
                current,
                limit: self.max_dir_count,
            });
        }
        Ok(())
    }
}

/// Reject names that would render misleadingly in listings or logs: C0 and
/// C1 controls, and the bidi embedding/override/isolate characters.
fn check_name_chars(name: &str) -> Result<(), FsLimitExceeded> {
    for character in name.chars() {
        let bidi = matches!(character, '\u{202A}'..='\u{202E}' | '\u{2066}'..='\u{2069}');
        if bidi {
            return Err(FsLimitExceeded::BidiControl {
                character,
                component: name.to_string(),
            });
        }
        if character.is_control() {
            return Err(FsLimitExceeded::ControlChar {
                character,
                component: name.to_string(),
            });
        }
    }
    Ok(())
}

fn code_point(character: &char) -> String {
    format!("U+{:04X}", u32::from(*character))
}

/// A limit that an operation would have broken. The operation had no effect.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FsLimitExceeded {
    /// Adding `additional` bytes to `current` would pass `limit`.
    #[error("filesystem full: {current} + {additional} bytes exceeds {limit} byte limit")]
    TotalBytes {
        current: u64,
        additional: u64,
        limit: u64,
    },

    /// A file would grow to `size` bytes.
    #[error("file too large: {size} bytes exceeds {limit} byte limit")]
    FileSize { size: u64, limit: u64 },

    /// Every file slot is taken.
    #[error("too many files: {current} of {limit} in use")]
    FileCount { current: u64, limit: u64 },

    /// Every directory slot is taken.
    #[error("too many directories: {current} of {limit} in use")]
    DirCount { current: u64, limit: u64 },

    /// The path has more components than allowed.
    #[error("path too deep: {depth} levels exceeds {limit} level limit")]
    PathTooDeep { depth: usize, limit: usize },

    /// One component is longer than allowed.
    #[error("filename too long: {length} bytes exceeds {limit} byte limit")]
    FilenameTooLong { length: usize, limit: usize },

    /// The rendered path is longer than allowed.
    #[error("path too long: {length} bytes exceeds {limit} byte limit")]
    PathTooLong { length: usize, limit: usize },

    /// A name contains a C0 or C1 control character.
    #[error("unsafe character {} in name '{}'", code_point(.character), .component.escape_debug())]
    ControlChar { character: char, component: String },

    /// A name contains a bidi embedding, override or isolate character.
    #[error("bidi control {} in name '{}'", code_point(.character), .component.escape_debug())]
    BidiControl { character: char, component: String },
}

/// Usage counters at one instant.
///
/// Returned by [`InMemoryFs::usage()`](crate::InMemoryFs::usage). Each
/// counter is read atomically, but the three are not read together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsUsage {
    /// Bytes held by linked files.
    pub total_bytes: u64,
    /// Linked files.
    pub file_count: u64,
    /// Linked directories, root excluded.
    pub dir_count: u64,
}

impl FsUsage {
    /// Usage from raw counter values.
    pub fn new(total_bytes: u64, file_count: u64, dir_count: u64) -> Self {
        Self {
            total_bytes,
            file_count,
            dir_count,
        }
    }
}
