//! Incremental graph seam.
//!
//! The graph owns request storage, validity and persistence. This crate only
//! registers requests into it and reads their stored results back.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DevDepError;
use crate::project_path::ProjectPath;
use crate::request::FileCreateInvalidation;

/// Request kind under which dev dependency subrequests are recorded.
pub const DEV_DEP_REQUEST: &str = "dev_dep_request";

/// A condition that marks a request stale.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Invalidation {
    FileUpdate(ProjectPath),
    FileDelete(ProjectPath),
    FileCreate(FileCreateInvalidation),
}

/// A replayable unit of work.
///
/// The graph reads `invalidations` and calls `execute` only when the request
/// is missing or invalid.
pub trait Request: Send + Sync {
    fn id(&self) -> String;

    fn kind(&self) -> &'static str;

    /// Conditions under which the stored result goes stale.
    fn invalidations(&self) -> Result<Vec<Invalidation>, DevDepError>;

    /// Produces the result to store.
    fn execute(&self) -> Result<serde_json::Value, DevDepError>;

    /// Content digests of watched files as they were read to produce the
    /// result. The graph takes these as the baseline for change detection;
    /// watched files missing here are read from disk when the request runs.
    fn file_digests(&self) -> BTreeMap<ProjectPath, String> {
        BTreeMap::new()
    }
}

/// A subrequest previously recorded against the current request.
#[derive(Debug, Clone, PartialEq)]
pub struct SubrequestRecord {
    pub id: String,
    pub result: Option<serde_json::Value>,
}

/// Incremental computation graph, scoped to the request currently running.
#[async_trait]
pub trait IncrementalGraph: Send + Sync {
    /// Subrequests of the given kind recorded against the current request.
    async fn subrequests(&self, kind: &str) -> Result<Vec<SubrequestRecord>, DevDepError>;

    /// Whether none of the request's invalidations fired since it last ran.
    fn is_valid(&self, id: &str) -> bool;

    /// Runs `request` as a subrequest of the current request, unless a valid
    /// request with the same id already exists.
    async fn run_request(&self, request: &dyn Request) -> Result<(), DevDepError>;

    /// The stored result of a request.
    async fn request_result(&self, id: &str) -> Result<Option<serde_json::Value>, DevDepError>;
}
