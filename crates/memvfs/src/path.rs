//! Path normalization.
//!
//! Every path handed to the filesystem is cleaned into a [`VfsPath`]: an
//! absolute sequence of name components. Relative paths resolve against the
//! root, `.` is dropped, `..` pops a component (and stops at the root), and
//! both `/` and `\` act as separators. Two paths name the same entry iff
//! their normalized components are equal.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// A normalized, absolute path inside the virtual filesystem.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct VfsPath {
    components: Vec<String>,
}

impl VfsPath {
    /// The root path `/`.
    pub fn root() -> Self {
        Self::default()
    }

    /// Normalize a caller-supplied path.
    ///
    /// Fails only if the path is not valid UTF-8.
    pub fn new(path: &Path) -> Result<Self> {
        let raw = path.to_str().ok_or_else(|| {
            Error::InvalidPath(format!("not valid UTF-8: {}", path.to_string_lossy()))
        })?;
        Ok(Self::parse(raw))
    }

    /// Normalize a path given as a string.
    pub fn parse(raw: &str) -> Self {
        let mut components: Vec<String> = Vec::new();
        for part in raw.split(['/', '\\']) {
            match part {
                "" | "." => {}
                ".." => {
                    components.pop();
                }
                name => components.push(name.to_string()),
            }
        }
        Self { components }
    }

    /// True for `/`.
    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }

    /// Name components from the root down.
    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// Number of components (the root has depth 0).
    pub fn depth(&self) -> usize {
        self.components.len()
    }

    /// The final component, or `None` for the root.
    pub fn file_name(&self) -> Option<&str> {
        self.components.last().map(String::as_str)
    }

    /// Split into the parent path and the final component.
    ///
    /// Returns `None` for the root, which has no parent.
    pub fn split_last(&self) -> Option<(VfsPath, &str)> {
        let (last, rest) = self.components.split_last()?;
        Some((
            VfsPath {
                components: rest.to_vec(),
            },
            last.as_str(),
        ))
    }

    /// Append one name component.
    pub fn join(&self, name: &str) -> VfsPath {
        let mut components = self.components.clone();
        components.push(name.to_string());
        VfsPath { components }
    }

    /// Render as an absolute [`PathBuf`].
    pub fn to_path_buf(&self) -> PathBuf {
        PathBuf::from(self.to_string())
    }
}

impl fmt::Display for VfsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.components.is_empty() {
            return f.write_str("/");
        }
        for name in &self.components {
            write!(f, "/{}", name)?;
        }
        Ok(())
    }
}

impl From<&str> for VfsPath {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_resolves_against_root() {
        assert_eq!(VfsPath::parse("test_dir").to_string(), "/test_dir");
        assert_eq!(VfsPath::parse("test_dir/00/1.txt").depth(), 3);
    }

    #[test]
    fn test_dots_and_separators() {
        assert_eq!(VfsPath::parse("/a/./b//c/").to_string(), "/a/b/c");
        assert_eq!(VfsPath::parse("/a/b/../c").to_string(), "/a/c");
        assert_eq!(VfsPath::parse("a\\b\\c").to_string(), "/a/b/c");
    }

    #[test]
    fn test_parent_dir_clamps_at_root() {
        assert!(VfsPath::parse("/../../..").is_root());
        assert_eq!(VfsPath::parse("/../x").to_string(), "/x");
    }

    #[test]
    fn test_root_forms() {
        for raw in ["", "/", ".", "//", "/./"] {
            let p = VfsPath::parse(raw);
            assert!(p.is_root(), "{raw:?} should be root");
            assert_eq!(p.to_string(), "/");
            assert!(p.split_last().is_none());
        }
    }

    #[test]
    fn test_split_last() {
        let p = VfsPath::parse("/a/b/c");
        let (parent, name) = p.split_last().unwrap();
        assert_eq!(parent.to_string(), "/a/b");
        assert_eq!(name, "c");
        assert_eq!(parent.join(name), p);
    }

    #[test]
    fn test_equivalence() {
        assert_eq!(VfsPath::parse("a/b"), VfsPath::parse("/a/x/../b/."));
    }
}
