//! Records dev dependency requests in the incremental graph.

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::DevDepError;
use crate::graph::{DEV_DEP_REQUEST, IncrementalGraph, Invalidation, Request};
use crate::project_path::ProjectPath;
use crate::request::{DevDepRequest, StoredDevDep};

/// A dev dependency subrequest: valid until one of the request's files
/// changes or one of its creation rules is satisfied.
#[derive(Debug, Clone, Copy)]
pub struct DevDepSubrequest<'a> {
    request: &'a DevDepRequest,
}

impl<'a> DevDepSubrequest<'a> {
    pub fn new(request: &'a DevDepRequest) -> Self {
        Self { request }
    }
}

impl Request for DevDepSubrequest<'_> {
    /// Keyed on specifier and hash, so equal hashes from different locations
    /// share one subrequest.
    fn id(&self) -> String {
        format!(
            "{}:{}:{}",
            DEV_DEP_REQUEST, self.request.specifier, self.request.hash
        )
    }

    fn kind(&self) -> &'static str {
        DEV_DEP_REQUEST
    }

    fn invalidations(&self) -> Result<Vec<Invalidation>, DevDepError> {
        let (Some(on_change), Some(on_create)) = (
            &self.request.invalidate_on_file_change,
            &self.request.invalidate_on_file_create,
        ) else {
            return Err(DevDepError::inconsistency(format!(
                "Dev dependency '{}' has no invalidations to record",
                self.request.key()
            )));
        };

        let mut invalidations = Vec::with_capacity(on_change.len() * 2 + on_create.len());
        for path in on_change {
            invalidations.push(Invalidation::FileUpdate(path.clone()));
            invalidations.push(Invalidation::FileDelete(path.clone()));
        }
        invalidations.extend(on_create.iter().cloned().map(Invalidation::FileCreate));
        Ok(invalidations)
    }

    fn execute(&self) -> Result<serde_json::Value, DevDepError> {
        serde_json::to_value(StoredDevDep::from(self.request))
            .map_err(|e| DevDepError::graph(format!("Failed to serialize dev dependency: {}", e)))
    }

    fn file_digests(&self) -> BTreeMap<ProjectPath, String> {
        self.request.file_digests.clone()
    }
}

/// Registers `request` as a subrequest of the current graph request.
///
/// A no-op when a valid subrequest with the same id exists. A reused request
/// is only valid input while its prior subrequest stays valid; if the graph
/// needs to run it anyway the missing invalidation sets surface as
/// [`DevDepError::GraphInconsistency`].
pub async fn register(
    request: &DevDepRequest,
    graph: &dyn IncrementalGraph,
) -> Result<(), DevDepError> {
    let subrequest = DevDepSubrequest::new(request);
    debug!("Registering subrequest '{}'", subrequest.id());
    graph.run_request(&subrequest).await
}
