//! Per-build orchestration of dev dependency tracking.

use std::path::PathBuf;
use std::sync::Arc;

use futures_util::future::try_join_all;
use tracing::info;

use crate::dependency::{DevDepResolver, PluginContext};
use crate::error::DevDepError;
use crate::graph::IncrementalGraph;
use crate::hash::HashService;
use crate::invalidate::InvalidationDeduper;
use crate::ledger::InvalidationLedger;
use crate::module_resolver::ModuleResolver;
use crate::plugin_registry::PluginRegistry;
use crate::reconcile::{ReconciledDevDeps, reconcile};
use crate::register::register;
use crate::request::{DevDepHashes, DevDepRequest, DevDepSpecifier};

/// Collaborators shared by every build in a process.
#[derive(Clone)]
pub struct DevDepServices {
    pub project_root: PathBuf,
    pub resolver: Arc<dyn ModuleResolver>,
    pub registry: Arc<dyn PluginRegistry>,
    pub hasher: Arc<dyn HashService>,
}

impl DevDepServices {
    pub fn new(
        project_root: impl Into<PathBuf>,
        resolver: Arc<dyn ModuleResolver>,
        registry: Arc<dyn PluginRegistry>,
        hasher: Arc<dyn HashService>,
    ) -> Self {
        Self {
            project_root: project_root.into(),
            resolver,
            registry,
            hasher,
        }
    }
}

/// One build's view of dev dependencies.
///
/// `begin` reconciles prior state and clears runtime caches of changed
/// dependencies. Each dependency the build then needs goes through
/// [`BuildCycle::dev_dependency`], which resolves it against the recovered
/// hashes and registers the result for the next build.
pub struct BuildCycle<'g> {
    graph: &'g dyn IncrementalGraph,
    resolver: DevDepResolver,
    reconciled: ReconciledDevDeps,
}

impl<'g> BuildCycle<'g> {
    pub async fn begin(
        graph: &'g dyn IncrementalGraph,
        services: &DevDepServices,
        ledger: &InvalidationLedger,
    ) -> Result<Self, DevDepError> {
        let reconciled = reconcile(graph).await?;

        let deduper = InvalidationDeduper::new(
            services.project_root.clone(),
            Arc::clone(&services.registry),
            Arc::clone(&services.resolver),
        );
        deduper.invalidate(&reconciled.invalid_dev_deps, ledger);

        let resolver = DevDepResolver::new(
            services.project_root.clone(),
            Arc::clone(&services.resolver),
            Arc::clone(&services.hasher),
        );

        Ok(Self {
            graph,
            resolver,
            reconciled,
        })
    }

    /// Hashes recovered from still-valid subrequests.
    pub fn prior_hashes(&self) -> &DevDepHashes {
        &self.reconciled.dev_deps
    }

    /// Dependencies invalidated at the start of this build.
    pub fn invalidated(&self) -> &[DevDepSpecifier] {
        &self.reconciled.invalid_dev_deps
    }

    /// Resolves and registers one dev dependency of `plugin`.
    pub async fn dev_dependency(
        &self,
        dev_dep: &DevDepSpecifier,
        plugin: &PluginContext,
    ) -> Result<DevDepRequest, DevDepError> {
        let request = self
            .resolver
            .resolve(dev_dep, plugin, &self.reconciled.dev_deps)
            .await?;
        register(&request, self.graph).await?;
        Ok(request)
    }

    /// Resolves a batch concurrently, then registers each result in order.
    pub async fn dev_dependencies(
        &self,
        dev_deps: &[(DevDepSpecifier, PluginContext)],
    ) -> Result<Vec<DevDepRequest>, DevDepError> {
        let requests = try_join_all(dev_deps.iter().map(|(dev_dep, plugin)| {
            self.resolver
                .resolve(dev_dep, plugin, &self.reconciled.dev_deps)
        }))
        .await?;

        for request in &requests {
            register(request, self.graph).await?;
        }

        let reused = requests.iter().filter(|r| r.is_reused()).count();
        info!(
            "Tracked {} dev dependencies ({} reused, {} rehashed)",
            requests.len(),
            reused,
            requests.len() - reused
        );
        Ok(requests)
    }
}
