//! Build-scoped view of the request graph.

use async_trait::async_trait;
use parking_lot::Mutex;
use plugwatch_core::{DevDepError, IncrementalGraph, Request, SubrequestRecord};
use tracing::debug;

use crate::error::GraphError;
use crate::graph::{RequestGraph, parse_result};
use crate::state::{RequestNode, StoredInvalidation};

/// Records the subrequests a build request runs.
///
/// Subrequest queries see the edges recorded by the previous run of the
/// parent. [`RequestTracker::finish`] replaces them with the requests run
/// through this tracker.
pub struct RequestTracker<'g> {
    graph: &'g RequestGraph,
    parent: String,
    requested: Mutex<Vec<String>>,
    executed: Mutex<Vec<String>>,
}

impl<'g> RequestTracker<'g> {
    pub(crate) fn new(graph: &'g RequestGraph, parent: &str) -> Self {
        Self {
            graph,
            parent: parent.to_string(),
            requested: Mutex::new(Vec::new()),
            executed: Mutex::new(Vec::new()),
        }
    }

    pub fn parent(&self) -> &str {
        &self.parent
    }

    /// Commits the run: records edges, marks the parent valid and drops
    /// unreachable requests. Watched files were snapshotted as each request
    /// ran.
    ///
    /// Returns the ids of requests that executed.
    pub fn finish(self) -> Vec<String> {
        let requested = self.requested.into_inner();
        let executed = self.executed.into_inner();

        {
            let mut state = self.graph.state.write();
            if let Some(parent) = state.nodes.get_mut(&self.parent) {
                parent.subrequests = requested;
                parent.valid = true;
            }
        }
        self.graph.collect_garbage();

        debug!(
            "Finished '{}' with {} executed subrequests",
            self.parent,
            executed.len()
        );
        executed
    }

    fn record(&self, id: &str) {
        let mut requested = self.requested.lock();
        if !requested.iter().any(|r| r == id) {
            requested.push(id.to_string());
        }
    }
}

#[async_trait]
impl IncrementalGraph for RequestTracker<'_> {
    async fn subrequests(&self, kind: &str) -> Result<Vec<SubrequestRecord>, DevDepError> {
        let state = self.graph.state.read();
        let Some(parent) = state.nodes.get(&self.parent) else {
            return Ok(Vec::new());
        };

        let mut records = Vec::new();
        for id in &parent.subrequests {
            let Some(node) = state.nodes.get(id) else {
                continue;
            };
            if node.kind == kind {
                records.push(SubrequestRecord {
                    id: id.clone(),
                    result: parse_result(id, node)?,
                });
            }
        }
        Ok(records)
    }

    fn is_valid(&self, id: &str) -> bool {
        self.graph.is_valid(id)
    }

    async fn run_request(&self, request: &dyn Request) -> Result<(), DevDepError> {
        let id = request.id();
        self.record(&id);
        if self.graph.is_valid(&id) {
            return Ok(());
        }

        let invalidations: Vec<StoredInvalidation> = request
            .invalidations()?
            .iter()
            .map(StoredInvalidation::from)
            .collect();
        let result = request.execute()?;
        let result = serde_json::to_string(&result)
            .map_err(|e| GraphError::Serialization(e.to_string()))?;

        let mut node = RequestNode::new(request.kind());
        node.valid = true;
        node.result = Some(result);
        node.invalidations = invalidations;
        self.graph.state.write().nodes.insert(id.clone(), node);
        self.graph.snapshot_request(&id, &request.file_digests());

        debug!("Executed request '{}'", id);
        self.executed.lock().push(id);
        Ok(())
    }

    async fn request_result(&self, id: &str) -> Result<Option<serde_json::Value>, DevDepError> {
        let state = self.graph.state.read();
        let node = state
            .nodes
            .get(id)
            .ok_or_else(|| GraphError::UnknownRequest(id.to_string()))?;
        Ok(parse_result(id, node)?)
    }
}
