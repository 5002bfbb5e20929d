//! Project-relative paths.
//!
//! Invalidation rules and persisted requests refer to files relative to the
//! project root so that a cache stays valid when the project is moved.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A forward-slash path relative to the project root.
///
/// Paths outside the root are expressed with leading `..` segments.
/// The root itself is `"."`. Trailing slashes are dropped, so `src` and
/// `src/` name the same directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ProjectPath(String);

impl ProjectPath {
    /// Creates a project path from an already relative string.
    pub fn new(path: impl Into<String>) -> Self {
        let mut path = path.into().replace('\\', "/");
        while let Some(rest) = path.strip_prefix("./") {
            path = rest.to_string();
        }
        path.truncate(path.trim_end_matches('/').len());
        if path.is_empty() {
            path.push('.');
        }
        Self(path)
    }

    /// Converts a path into project-relative form.
    ///
    /// Relative inputs are taken to be relative to `root` already.
    pub fn from_absolute(root: &Path, path: &Path) -> Self {
        if path.is_relative() {
            return Self::new(path.to_string_lossy());
        }

        let root_parts: Vec<Component<'_>> = root.components().collect();
        let path_parts: Vec<Component<'_>> = path.components().collect();
        let common = root_parts
            .iter()
            .zip(&path_parts)
            .take_while(|(a, b)| a == b)
            .count();

        let mut segments: Vec<String> = Vec::new();
        for _ in common..root_parts.len() {
            segments.push("..".to_string());
        }
        for part in &path_parts[common..] {
            match part {
                Component::CurDir => {}
                other => segments.push(other.as_os_str().to_string_lossy().into_owned()),
            }
        }

        Self::new(segments.join("/"))
    }

    /// Resolves this path against the project root.
    pub fn to_absolute(&self, root: &Path) -> PathBuf {
        if self.0 == "." {
            root.to_path_buf()
        } else {
            root.join(&self.0)
        }
    }

    /// Returns the path as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProjectPath {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl From<String> for ProjectPath {
    fn from(path: String) -> Self {
        Self::new(path)
    }
}

impl From<ProjectPath> for String {
    fn from(path: ProjectPath) -> Self {
        path.0
    }
}
