//! Project fixtures shared by the integration tests.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use plugwatch_core::{DevDepServices, FileHasher, LoadedPluginCache, NodeModulesResolver};
use tempfile::TempDir;

/// A temporary project directory with an installed `node_modules`.
pub struct Project {
    dir: TempDir,
    pub resolver: Arc<NodeModulesResolver>,
    pub plugins: Arc<LoadedPluginCache>,
}

impl Project {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        Self {
            dir,
            resolver: Arc::new(NodeModulesResolver::new()),
            plugins: Arc::new(LoadedPluginCache::new()),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.root().join(".plugwatch-cache")
    }

    /// Installs `node_modules/<name>` with an `index.js` entry.
    pub fn install(&self, name: &str, code: &str) {
        let package_dir = self.root().join("node_modules").join(name);
        fs::create_dir_all(&package_dir).unwrap();
        fs::write(
            package_dir.join("package.json"),
            format!(r#"{{"name": "{}"}}"#, name),
        )
        .unwrap();
        fs::write(package_dir.join("index.js"), code).unwrap();
    }

    pub fn write(&self, path: &str, content: &str) {
        let path = self.root().join(path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    /// Collaborators as a build process would wire them.
    pub fn services(&self) -> DevDepServices {
        DevDepServices::new(
            self.root(),
            self.resolver.clone(),
            self.plugins.clone(),
            Arc::new(FileHasher::new(self.root())),
        )
    }
}

impl Default for Project {
    fn default() -> Self {
        Self::new()
    }
}
