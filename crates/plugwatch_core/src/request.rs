//! Dev dependency request types.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::project_path::ProjectPath;

/// Identity of a dev dependency: a specifier resolved from a location.
///
/// Always the string `"{specifier}:{resolve_from}"`, so two requests for the
/// same specifier from different locations are distinct.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DevDepKey(String);

impl DevDepKey {
    pub fn new(specifier: &str, resolve_from: &ProjectPath) -> Self {
        Self(format!("{}:{}", specifier, resolve_from))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DevDepKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A specifier together with the location it is resolved from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevDepSpecifier {
    pub specifier: String,
    pub resolve_from: ProjectPath,
}

impl DevDepSpecifier {
    pub fn new(specifier: impl Into<String>, resolve_from: impl Into<ProjectPath>) -> Self {
        Self {
            specifier: specifier.into(),
            resolve_from: resolve_from.into(),
        }
    }

    pub fn key(&self) -> DevDepKey {
        DevDepKey::new(&self.specifier, &self.resolve_from)
    }
}

/// Prior hashes of dev dependencies that are provably unchanged.
pub type DevDepHashes = HashMap<DevDepKey, String>;

/// A file-creation invalidation rule in project-relative form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum FileCreateInvalidation {
    /// The exact file is created.
    FilePath { file_path: ProjectPath },
    /// Any file matching the glob is created.
    Glob { glob: String },
    /// A file named `file_name` is created in `above_file_path` or any of
    /// its ancestors.
    FileName {
        file_name: String,
        above_file_path: ProjectPath,
    },
}

/// A file-creation rule as reported by a module resolver, with absolute paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileCreateRule {
    FilePath(PathBuf),
    Glob(String),
    FileName {
        file_name: String,
        above_file_path: PathBuf,
    },
}

impl FileCreateRule {
    /// Converts the rule to project-relative form.
    pub fn to_project(&self, root: &Path) -> FileCreateInvalidation {
        match self {
            Self::FilePath(path) => FileCreateInvalidation::FilePath {
                file_path: ProjectPath::from_absolute(root, path),
            },
            Self::Glob(glob) => FileCreateInvalidation::Glob {
                glob: ProjectPath::from_absolute(root, Path::new(glob))
                    .as_str()
                    .to_string(),
            },
            Self::FileName {
                file_name,
                above_file_path,
            } => FileCreateInvalidation::FileName {
                file_name: file_name.clone(),
                above_file_path: ProjectPath::from_absolute(root, above_file_path),
            },
        }
    }
}

/// One resolved dev dependency for one build.
///
/// The invalidation sets are `None` when the hash was reused from a still
/// valid prior subrequest, whose own rules already cover this dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevDepRequest {
    pub specifier: String,
    pub resolve_from: ProjectPath,
    pub hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalidate_on_file_change: Option<BTreeSet<ProjectPath>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalidate_on_file_create: Option<Vec<FileCreateInvalidation>>,
    /// Other plugins to invalidate when this dependency changes.
    /// Never `Some` of an empty list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_invalidations: Option<Vec<DevDepSpecifier>>,
    /// Content digest of each file behind `hash`, as it was read.
    #[serde(skip)]
    pub file_digests: BTreeMap<ProjectPath, String>,
}

impl DevDepRequest {
    /// A request whose hash is reused from a valid prior subrequest.
    pub fn reused(dev_dep: &DevDepSpecifier, hash: impl Into<String>) -> Self {
        Self {
            specifier: dev_dep.specifier.clone(),
            resolve_from: dev_dep.resolve_from.clone(),
            hash: hash.into(),
            invalidate_on_file_change: None,
            invalidate_on_file_create: None,
            additional_invalidations: None,
            file_digests: BTreeMap::new(),
        }
    }

    /// A freshly computed request with its invalidation rules.
    pub fn computed(
        dev_dep: &DevDepSpecifier,
        hash: impl Into<String>,
        invalidate_on_file_change: BTreeSet<ProjectPath>,
        invalidate_on_file_create: Vec<FileCreateInvalidation>,
        additional_invalidations: Vec<DevDepSpecifier>,
    ) -> Self {
        Self {
            specifier: dev_dep.specifier.clone(),
            resolve_from: dev_dep.resolve_from.clone(),
            hash: hash.into(),
            invalidate_on_file_change: Some(invalidate_on_file_change),
            invalidate_on_file_create: Some(invalidate_on_file_create),
            additional_invalidations: non_empty(additional_invalidations),
            file_digests: BTreeMap::new(),
        }
    }

    /// Attaches the per-file digests the hash was computed from.
    pub fn with_file_digests(mut self, file_digests: BTreeMap<ProjectPath, String>) -> Self {
        self.file_digests = file_digests;
        self
    }

    pub fn key(&self) -> DevDepKey {
        DevDepKey::new(&self.specifier, &self.resolve_from)
    }

    /// Whether the hash was reused instead of recomputed.
    pub fn is_reused(&self) -> bool {
        self.invalidate_on_file_change.is_none() && self.invalidate_on_file_create.is_none()
    }
}

/// The record a dev dependency subrequest stores as its result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredDevDep {
    pub specifier: String,
    pub resolve_from: ProjectPath,
    pub hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_invalidations: Option<Vec<DevDepSpecifier>>,
}

impl StoredDevDep {
    pub fn key(&self) -> DevDepKey {
        DevDepKey::new(&self.specifier, &self.resolve_from)
    }

    pub fn dev_dep(&self) -> DevDepSpecifier {
        DevDepSpecifier::new(self.specifier.clone(), self.resolve_from.clone())
    }

    /// Collapses an empty list of additional invalidations to `None`.
    pub fn normalized(mut self) -> Self {
        self.additional_invalidations = self.additional_invalidations.and_then(non_empty);
        self
    }
}

impl From<&DevDepRequest> for StoredDevDep {
    fn from(request: &DevDepRequest) -> Self {
        Self {
            specifier: request.specifier.clone(),
            resolve_from: request.resolve_from.clone(),
            hash: request.hash.clone(),
            additional_invalidations: request.additional_invalidations.clone(),
        }
    }
}

fn non_empty(list: Vec<DevDepSpecifier>) -> Option<Vec<DevDepSpecifier>> {
    if list.is_empty() { None } else { Some(list) }
}
