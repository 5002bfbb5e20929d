//! Persisted graph state.

use std::collections::HashMap;

use plugwatch_core::{FileCreateInvalidation, Invalidation};

/// Everything the graph persists between builds.
#[derive(Debug, Clone, Default, rkyv::Archive, rkyv::Serialize, rkyv::Deserialize)]
pub(crate) struct GraphState {
    /// Requests by id.
    pub nodes: HashMap<String, RequestNode>,
    /// Content hash of each watched file when last seen; `None` if absent.
    pub files: HashMap<String, Option<String>>,
    /// Paths matching each file-creation rule when last seen, by rule key.
    pub create_matches: HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, rkyv::Archive, rkyv::Serialize, rkyv::Deserialize)]
pub(crate) struct RequestNode {
    pub kind: String,
    pub valid: bool,
    /// JSON text of the stored result.
    pub result: Option<String>,
    pub invalidations: Vec<StoredInvalidation>,
    /// Ids of the requests this request ran during its last run.
    pub subrequests: Vec<String>,
}

impl RequestNode {
    pub fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            valid: false,
            result: None,
            invalidations: Vec::new(),
            subrequests: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, rkyv::Archive, rkyv::Serialize, rkyv::Deserialize)]
pub(crate) enum StoredInvalidation {
    FileUpdate(String),
    FileDelete(String),
    Create(CreateRule),
}

#[derive(Debug, Clone, PartialEq, Eq, rkyv::Archive, rkyv::Serialize, rkyv::Deserialize)]
pub(crate) enum CreateRule {
    FilePath(String),
    Glob(String),
    FileName {
        file_name: String,
        above_file_path: String,
    },
}

impl CreateRule {
    /// Stable key for the rule's known matches.
    pub fn key(&self) -> String {
        match self {
            Self::FilePath(path) => format!("path:{}", path),
            Self::Glob(glob) => format!("glob:{}", glob),
            Self::FileName {
                file_name,
                above_file_path,
            } => format!("name:{}@{}", file_name, above_file_path),
        }
    }
}

impl From<&FileCreateInvalidation> for CreateRule {
    fn from(rule: &FileCreateInvalidation) -> Self {
        match rule {
            FileCreateInvalidation::FilePath { file_path } => {
                Self::FilePath(file_path.as_str().to_string())
            }
            FileCreateInvalidation::Glob { glob } => Self::Glob(glob.clone()),
            FileCreateInvalidation::FileName {
                file_name,
                above_file_path,
            } => Self::FileName {
                file_name: file_name.clone(),
                above_file_path: above_file_path.as_str().to_string(),
            },
        }
    }
}

impl From<&Invalidation> for StoredInvalidation {
    fn from(invalidation: &Invalidation) -> Self {
        match invalidation {
            Invalidation::FileUpdate(path) => Self::FileUpdate(path.as_str().to_string()),
            Invalidation::FileDelete(path) => Self::FileDelete(path.as_str().to_string()),
            Invalidation::FileCreate(rule) => Self::Create(CreateRule::from(rule)),
        }
    }
}

impl StoredInvalidation {
    /// The watched file path, for change and delete rules.
    pub fn watched_file(&self) -> Option<&str> {
        match self {
            Self::FileUpdate(path) | Self::FileDelete(path) => Some(path),
            Self::Create(_) => None,
        }
    }
}
