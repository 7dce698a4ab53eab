//! Error types for memvfs
//!
//! Every filesystem operation returns [`Result`]. The variants are the
//! complete taxonomy callers need to tell apart:
//! - Namespace outcomes: not found, already exists, wrong node type, not empty
//! - Handle outcomes: closed, opened without the needed access
//! - Configuration outcomes: resource limits, invalid paths
//!
//! None of these are fatal. Races are resolved by locking, so the filesystem
//! never retries internally and never leaves a partial mutation behind.

use std::io::ErrorKind;
use std::path::PathBuf;

use crate::fs::FsLimitExceeded;
use thiserror::Error;

/// Result type alias using memvfs's Error.
pub type Result<T> = std::result::Result<T, Error>;

/// memvfs error types.
#[derive(Error, Debug)]
pub enum Error {
    /// The path, or one of its ancestors, does not exist.
    #[error("not found: {}", .0.display())]
    NotFound(PathBuf),

    /// An entry with this name already exists.
    #[error("already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    /// A path component expected to be a directory is a file.
    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    /// A file operation was attempted on a directory.
    #[error("is a directory: {}", .0.display())]
    IsADirectory(PathBuf),

    /// Attempted to remove a directory that still has entries.
    #[error("directory not empty: {}", .0.display())]
    NotEmpty(PathBuf),

    /// The handle was already closed.
    #[error("file already closed")]
    Closed,

    /// The handle was not opened for reading.
    #[error("handle not opened for reading")]
    NotReadable,

    /// The handle was not opened for writing.
    #[error("handle not opened for writing")]
    NotWritable,

    /// The path cannot be used for this operation.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// An argument was out of range (e.g. seeking before offset 0).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Resource limit exceeded.
    #[error("resource limit exceeded: {0}")]
    Limit(#[from] FsLimitExceeded),

    /// I/O error from a non-memory backing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error for unexpected failures, such as a poisoned lock.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map the error onto the closest [`std::io::ErrorKind`].
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Error::NotADirectory(_) => ErrorKind::NotADirectory,
            Error::IsADirectory(_) => ErrorKind::IsADirectory,
            Error::NotEmpty(_) => ErrorKind::DirectoryNotEmpty,
            Error::Closed => ErrorKind::BrokenPipe,
            Error::NotReadable | Error::NotWritable => ErrorKind::PermissionDenied,
            Error::InvalidPath(_) | Error::InvalidInput(_) => ErrorKind::InvalidInput,
            Error::Limit(_) => ErrorKind::StorageFull,
            Error::Io(err) => err.kind(),
            Error::Internal(_) => ErrorKind::Other,
        }
    }

    /// True if this is a "not found" outcome.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// True if this is an "already exists" outcome.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Error::AlreadyExists(_))
    }
}

impl From<Error> for std::io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(inner) => inner,
            other => std::io::Error::new(other.kind(), other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            Error::NotFound(PathBuf::from("/a")).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            Error::NotEmpty(PathBuf::from("/a")).kind(),
            ErrorKind::DirectoryNotEmpty
        );
        assert_eq!(Error::NotWritable.kind(), ErrorKind::PermissionDenied);
    }

    #[test]
    fn test_into_io_error_keeps_message() {
        let io: std::io::Error = Error::AlreadyExists(PathBuf::from("/test_dir")).into();
        assert_eq!(io.kind(), ErrorKind::AlreadyExists);
        assert!(io.to_string().contains("/test_dir"));
    }

    #[test]
    fn test_io_error_round_trips_unchanged() {
        let original = std::io::Error::new(ErrorKind::TimedOut, "slow disk");
        let io: std::io::Error = Error::Io(original).into();
        assert_eq!(io.kind(), ErrorKind::TimedOut);
    }
}
