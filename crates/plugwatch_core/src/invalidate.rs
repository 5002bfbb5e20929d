//! Runtime cache invalidation for changed dev dependencies.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use crate::ledger::InvalidationLedger;
use crate::module_resolver::ModuleResolver;
use crate::plugin_registry::PluginRegistry;
use crate::request::DevDepSpecifier;

/// Clears loaded plugins and cached resolutions, at most once per key per build.
pub struct InvalidationDeduper {
    project_root: PathBuf,
    registry: Arc<dyn PluginRegistry>,
    resolver: Arc<dyn ModuleResolver>,
}

impl InvalidationDeduper {
    pub fn new(
        project_root: impl Into<PathBuf>,
        registry: Arc<dyn PluginRegistry>,
        resolver: Arc<dyn ModuleResolver>,
    ) -> Self {
        Self {
            project_root: project_root.into(),
            registry,
            resolver,
        }
    }

    /// Invalidates every dependency in `invalid_dev_deps` not yet in `ledger`.
    pub fn invalidate(&self, invalid_dev_deps: &[DevDepSpecifier], ledger: &InvalidationLedger) {
        for dev_dep in invalid_dev_deps {
            let key = dev_dep.key();
            // The key is marked before the side effects run so a repeated
            // entry never reaches the collaborators twice.
            if !ledger.mark(key.clone()) {
                debug!("Skipping '{}', already invalidated in this build", key);
                continue;
            }

            debug!("Invalidating dev dependency '{}'", key);
            self.registry.invalidate_plugin(&dev_dep.specifier);
            self.resolver.invalidate(
                &dev_dep.specifier,
                &dev_dep.resolve_from.to_absolute(&self.project_root),
            );
        }
    }
}
