//! Recovers dev dependency state recorded by the previous build.

use tracing::{debug, info};

use crate::error::DevDepError;
use crate::graph::{DEV_DEP_REQUEST, IncrementalGraph};
use crate::request::{DevDepHashes, DevDepSpecifier, StoredDevDep};

/// Dev dependency state recovered from the graph at the start of a build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciledDevDeps {
    /// Hashes of dev dependencies whose subrequest is still valid.
    pub dev_deps: DevDepHashes,
    /// Dev dependencies whose subrequest was invalidated, in record order,
    /// each followed by its additional invalidations. May repeat entries.
    pub invalid_dev_deps: Vec<DevDepSpecifier>,
}

/// Partitions recorded dev dependency subrequests by validity.
///
/// Read-only against the graph. A record without a result, or with a result
/// that is not a stored dev dependency, fails with
/// [`DevDepError::GraphInconsistency`].
pub async fn reconcile(graph: &dyn IncrementalGraph) -> Result<ReconciledDevDeps, DevDepError> {
    let records = graph.subrequests(DEV_DEP_REQUEST).await?;
    let mut reconciled = ReconciledDevDeps::default();

    for record in records {
        let value = match record.result {
            Some(value) => value,
            None => graph.request_result(&record.id).await?.ok_or_else(|| {
                DevDepError::inconsistency(format!("Subrequest '{}' has no stored result", record.id))
            })?,
        };
        let stored: StoredDevDep = serde_json::from_value(value).map_err(|e| {
            DevDepError::inconsistency(format!(
                "Subrequest '{}' has a malformed result: {}",
                record.id, e
            ))
        })?;
        let stored = stored.normalized();

        if graph.is_valid(&record.id) {
            reconciled.dev_deps.insert(stored.key(), stored.hash);
        } else {
            debug!("Dev dependency '{}' changed since last build", stored.key());
            reconciled.invalid_dev_deps.push(stored.dev_dep());
            if let Some(additional) = stored.additional_invalidations {
                reconciled.invalid_dev_deps.extend(additional);
            }
        }
    }

    info!(
        "Reconciled dev dependencies: {} unchanged, {} invalidated",
        reconciled.dev_deps.len(),
        reconciled.invalid_dev_deps.len()
    );
    Ok(reconciled)
}
