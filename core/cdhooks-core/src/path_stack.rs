//! Absolute path normalization and ancestor stacks.
//!
//! Everything here is a pure string operation. Symlinks are never resolved:
//! the logical path the shell reports is the path whose ancestors get scripts.
//!
//! ```ignore
//! PathStack::build(&"/a/b/c".parse()?) -> ["/a/b/c", "/a/b", "/a", "/"]
//! PathStack::build(&AbsolutePath::root()) -> ["/"]
//! ```

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CdhooksError, Result};

/// A normalized, slash-delimited absolute path.
///
/// Invariants: starts with `/`, has no trailing slash (except root), no empty,
/// `.` or `..` segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AbsolutePath(String);

impl AbsolutePath {
    pub fn root() -> Self {
        AbsolutePath("/".to_string())
    }

    /// Parses and lexically normalizes an absolute path.
    ///
    /// `..` above root stays at root, matching how `cd /..` behaves.
    pub fn parse(raw: &str) -> Result<Self> {
        if !raw.starts_with('/') {
            return Err(CdhooksError::InvalidPath {
                path: raw.to_string(),
                reason: "path must be absolute".to_string(),
            });
        }

        let mut segments: Vec<&str> = Vec::new();
        for segment in raw.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    segments.pop();
                }
                other => segments.push(other),
            }
        }

        if segments.is_empty() {
            Ok(Self::root())
        } else {
            Ok(AbsolutePath(format!("/{}", segments.join("/"))))
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        Self::parse(&path.to_string_lossy())
    }

    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// The path with its last segment removed, or `None` for root.
    pub fn parent(&self) -> Option<AbsolutePath> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(0) | None => Some(Self::root()),
            Some(idx) => Some(AbsolutePath(self.0[..idx].to_string())),
        }
    }

    /// Path segments after the leading slash; empty for root.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_path(&self) -> &Path {
        Path::new(&self.0)
    }
}

impl fmt::Display for AbsolutePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for AbsolutePath {
    type Err = CdhooksError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for AbsolutePath {
    type Error = CdhooksError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<AbsolutePath> for String {
    fn from(path: AbsolutePath) -> String {
        path.0
    }
}

impl AsRef<Path> for AbsolutePath {
    fn as_ref(&self) -> &Path {
        self.as_path()
    }
}

/// A path followed by each of its ancestors, ending with root.
///
/// Index 0 is the path itself; the last element is always `/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathStack(Vec<AbsolutePath>);

impl PathStack {
    pub fn build(path: &AbsolutePath) -> Self {
        let mut stack = vec![path.clone()];
        let mut current = path.parent();
        while let Some(parent) = current {
            current = parent.parent();
            stack.push(parent);
        }
        PathStack(stack)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[AbsolutePath] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<AbsolutePath> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(raw: &str) -> AbsolutePath {
        AbsolutePath::parse(raw).unwrap()
    }

    #[test]
    fn strips_trailing_slash() {
        assert_eq!(p("/project/").as_str(), "/project");
        assert_eq!(p("/project//").as_str(), "/project");
    }

    #[test]
    fn preserves_root() {
        assert_eq!(p("/").as_str(), "/");
        assert_eq!(p("//").as_str(), "/");
        assert_eq!(p("///").as_str(), "/");
    }

    #[test]
    fn collapses_dot_segments() {
        assert_eq!(p("/a/./b/../c").as_str(), "/a/c");
        assert_eq!(p("/..").as_str(), "/");
        assert_eq!(p("/a//b").as_str(), "/a/b");
    }

    #[test]
    fn rejects_relative_paths() {
        assert!(matches!(
            AbsolutePath::parse("a/b"),
            Err(CdhooksError::InvalidPath { .. })
        ));
        assert!(AbsolutePath::parse("").is_err());
    }

    #[test]
    fn parent_walks_toward_root() {
        assert_eq!(p("/a/b").parent(), Some(p("/a")));
        assert_eq!(p("/a").parent(), Some(AbsolutePath::root()));
        assert_eq!(AbsolutePath::root().parent(), None);
    }

    #[test]
    fn stack_lists_ancestors_deepest_first() {
        let stack = PathStack::build(&p("/a/b/c"));
        let rendered: Vec<&str> = stack.as_slice().iter().map(|s| s.as_str()).collect();
        assert_eq!(rendered, vec!["/a/b/c", "/a/b", "/a", "/"]);
    }

    #[test]
    fn root_stack_is_single_element() {
        let stack = PathStack::build(&AbsolutePath::root());
        assert_eq!(stack.as_slice(), &[AbsolutePath::root()]);
    }

    #[test]
    fn serde_round_trips_as_plain_string() {
        let json = serde_json::to_string(&p("/a/b")).unwrap();
        assert_eq!(json, "\"/a/b\"");
        let back: AbsolutePath = serde_json::from_str("\"/a/b/\"").unwrap();
        assert_eq!(back, p("/a/b"));
    }
}
