//! Logging infrastructure for memvfs
//!
//! Events are emitted through `tracing` when the `logging` feature is on and
//! compile to nothing when it is off, so the hot paths carry no cost for
//! embedders that don't want logs.
//!
//! # Log Levels
//!
//! - **WARN**: Resource limit rejections
//! - **DEBUG**: Namespace mutations (mkdir, create, remove)
//! - **TRACE**: Handle I/O and path resolution
//!
//! # Log injection
//!
//! Paths are caller-controlled and may contain newlines or other control
//! characters. Always pass them through [`sanitize_for_log`] before logging.

use std::borrow::Cow;
use std::path::Path;

/// Maximum length of a logged path before truncation.
pub(crate) const MAX_LOGGED_PATH: usize = 256;

macro_rules! vfs_warn {
    ($($arg:tt)*) => {
        #[cfg(feature = "logging")]
        ::tracing::warn!($($arg)*);
    };
}

macro_rules! vfs_debug {
    ($($arg:tt)*) => {
        #[cfg(feature = "logging")]
        ::tracing::debug!($($arg)*);
    };
}

macro_rules! vfs_trace {
    ($($arg:tt)*) => {
        #[cfg(feature = "logging")]
        ::tracing::trace!($($arg)*);
    };
}

pub(crate) use {vfs_debug, vfs_trace, vfs_warn};

/// Sanitize a path for logging.
///
/// Escapes newlines and tabs, drops other control characters, and truncates
/// at [`MAX_LOGGED_PATH`] bytes on a char boundary.
pub fn sanitize_for_log(path: &Path) -> Cow<'_, str> {
    let raw = path.to_string_lossy();
    let clean = !raw.chars().any(|c| c.is_control()) && raw.len() <= MAX_LOGGED_PATH;
    if clean {
        return raw;
    }

    let escaped: String = raw
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
        .chars()
        .filter(|c| !c.is_control())
        .collect();

    if escaped.len() <= MAX_LOGGED_PATH {
        return Cow::Owned(escaped);
    }
    let mut end = MAX_LOGGED_PATH;
    while end > 0 && !escaped.is_char_boundary(end) {
        end -= 1;
    }
    Cow::Owned(format!(
        "{}...[truncated {} bytes]",
        &escaped[..end],
        escaped.len() - end
    ))
}
