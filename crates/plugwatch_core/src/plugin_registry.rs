//! Cache of already-loaded plugins.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::DevDepError;

/// Drops cached plugin instances so the next load picks up new code.
pub trait PluginRegistry: Send + Sync {
    fn invalidate_plugin(&self, specifier: &str);
}

/// A plugin that has been loaded for this process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedPlugin {
    pub name: String,
    pub entry: PathBuf,
}

/// Thread-safe, name-keyed cache of loaded plugins.
///
/// # Example
///
/// ```ignore
/// let cache = LoadedPluginCache::new();
/// let plugin = cache.load("transformer-babel", || load_from_disk())?;
/// // later, when its code changed:
/// cache.invalidate_plugin("transformer-babel");
/// ```
#[derive(Default)]
pub struct LoadedPluginCache {
    plugins: Mutex<HashMap<String, Arc<LoadedPlugin>>>,
}

impl LoadedPluginCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached plugin, calling `loader` on a miss.
    pub fn load<F>(&self, name: &str, loader: F) -> Result<Arc<LoadedPlugin>, DevDepError>
    where
        F: FnOnce() -> Result<LoadedPlugin, DevDepError>,
    {
        if let Some(plugin) = self.get(name) {
            return Ok(plugin);
        }

        let plugin = Arc::new(loader()?);
        debug!("Loaded plugin '{}' from {}", name, plugin.entry.display());
        self.plugins
            .lock()
            .insert(name.to_string(), Arc::clone(&plugin));
        Ok(plugin)
    }

    pub fn get(&self, name: &str) -> Option<Arc<LoadedPlugin>> {
        self.plugins.lock().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.plugins.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.lock().is_empty()
    }
}

impl PluginRegistry for LoadedPluginCache {
    fn invalidate_plugin(&self, specifier: &str) {
        if self.plugins.lock().remove(specifier).is_some() {
            debug!("Invalidated loaded plugin '{}'", specifier);
        }
    }
}
