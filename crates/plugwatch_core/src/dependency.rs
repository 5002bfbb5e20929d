//! Dev dependency resolution and hashing.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use crate::error::DevDepError;
use crate::hash::HashService;
use crate::module_resolver::ModuleResolver;
use crate::project_path::ProjectPath;
use crate::request::{DevDepHashes, DevDepRequest, DevDepSpecifier, FileCreateInvalidation};

/// The plugin that is loading a dev dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginContext {
    pub plugin: DevDepSpecifier,
    /// Also invalidate the plugin itself when the dependency changes,
    /// e.g. a plugin that loaded a config file requiring the dependency.
    pub invalidate_parent_plugin: bool,
}

impl PluginContext {
    pub fn new(plugin: DevDepSpecifier) -> Self {
        Self {
            plugin,
            invalidate_parent_plugin: false,
        }
    }

    pub fn invalidate_parent(mut self, invalidate: bool) -> Self {
        self.invalidate_parent_plugin = invalidate;
        self
    }
}

/// Produces a [`DevDepRequest`] for a dev dependency.
pub struct DevDepResolver {
    project_root: PathBuf,
    resolver: Arc<dyn ModuleResolver>,
    hasher: Arc<dyn HashService>,
}

impl DevDepResolver {
    pub fn new(
        project_root: impl Into<PathBuf>,
        resolver: Arc<dyn ModuleResolver>,
        hasher: Arc<dyn HashService>,
    ) -> Self {
        Self {
            project_root: project_root.into(),
            resolver,
            hasher,
        }
    }

    /// Resolves `dev_dep` for `plugin`.
    ///
    /// A key present in `prior` returns that hash without touching the
    /// resolver or hasher; the still-valid prior subrequest already carries
    /// the invalidation rules. Otherwise the dependency is resolved and its
    /// hash recomputed from the files it depends on, regardless of any
    /// earlier result for the same key.
    pub async fn resolve(
        &self,
        dev_dep: &DevDepSpecifier,
        plugin: &PluginContext,
        prior: &DevDepHashes,
    ) -> Result<DevDepRequest, DevDepError> {
        if let Some(hash) = prior.get(&dev_dep.key()) {
            debug!("Reusing hash of '{}' from '{}'", dev_dep.specifier, dev_dep.resolve_from);
            return Ok(DevDepRequest::reused(dev_dep, hash.clone()));
        }

        let requester = &plugin.plugin.specifier;
        let from = dev_dep.resolve_from.to_absolute(&self.project_root);
        self.resolver
            .resolve(&dev_dep.specifier, &from)
            .await
            .map_err(|e| e.with_plugin(requester))?;
        let invalidations = self
            .resolver
            .invalidations(&dev_dep.specifier, &from)
            .await
            .map_err(|e| e.with_plugin(requester))?;

        let on_file_change: BTreeSet<ProjectPath> = invalidations
            .on_file_change
            .iter()
            .map(|path| ProjectPath::from_absolute(&self.project_root, path))
            .collect();
        let on_file_create: Vec<FileCreateInvalidation> = invalidations
            .on_file_create
            .iter()
            .map(|rule| rule.to_project(&self.project_root))
            .collect();

        // Creation rules are existence triggers for the graph, not hash inputs.
        let files: Vec<ProjectPath> = on_file_change.iter().cloned().collect();
        let hashed = self.hasher.hash_files(&files).await?;
        debug!(
            "Hashed '{}' from '{}' over {} files",
            dev_dep.specifier,
            dev_dep.resolve_from,
            files.len()
        );

        let additional_invalidations = if plugin.invalidate_parent_plugin {
            vec![plugin.plugin.clone()]
        } else {
            Vec::new()
        };

        Ok(DevDepRequest::computed(
            dev_dep,
            hashed.hash,
            on_file_change,
            on_file_create,
            additional_invalidations,
        )
        .with_file_digests(hashed.files))
    }
}
