//! Module resolution seam.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::DevDepError;
use crate::request::FileCreateRule;

/// Files and creation rules whose changes make a resolution stale.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolverInvalidations {
    /// Absolute paths whose change or deletion invalidates.
    pub on_file_change: Vec<PathBuf>,
    /// Creation rules, e.g. a closer `node_modules` copy of the package.
    pub on_file_create: Vec<FileCreateRule>,
}

/// Locates plugin code on disk and enumerates what it depends on.
#[async_trait]
pub trait ModuleResolver: Send + Sync {
    /// Ensures a resolution cache entry exists for `specifier` from `from`.
    async fn resolve(&self, specifier: &str, from: &Path) -> Result<(), DevDepError>;

    /// Invalidation sets of a resolved specifier.
    async fn invalidations(
        &self,
        specifier: &str,
        from: &Path,
    ) -> Result<ResolverInvalidations, DevDepError>;

    /// Drops the cached resolution and module for `specifier` from `from`.
    fn invalidate(&self, specifier: &str, from: &Path);
}
