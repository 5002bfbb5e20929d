//! Project configuration.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use jsonschema::Validator;
use serde::{Deserialize, Serialize};

use crate::dependency::PluginContext;
use crate::error::DevDepError;
use crate::project_path::ProjectPath;
use crate::request::DevDepSpecifier;

// Embed the schema
const SCHEMA_JSON: &str = include_str!("../../../schemas/v1/config.json");
static CONFIG_SCHEMA: OnceLock<Result<Validator, String>> = OnceLock::new();

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".plugwatch.json";

/// Configuration for a plugwatch project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlugwatchConfig {
    /// Plugins whose dev dependencies are tracked.
    #[serde(default)]
    pub plugins: Vec<PluginConfig>,

    /// Whether to persist the request graph between builds.
    #[serde(default = "default_cache")]
    pub cache: bool,

    /// Cache directory.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,

    /// Directory containing the configuration file. Serves as the project root.
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

fn default_cache() -> bool {
    true
}

fn default_cache_dir() -> String {
    ".plugwatch-cache".to_string()
}

/// A plugin and the dev dependencies it loads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginConfig {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolve_from: Option<String>,

    #[serde(default)]
    pub dev_dependencies: Vec<DevDependencyConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevDependencyConfig {
    pub specifier: String,

    /// Falls back to the plugin's `resolveFrom`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolve_from: Option<String>,

    #[serde(default)]
    pub invalidate_parent_on_change: bool,
}

impl PluginConfig {
    /// The plugin as a dev dependency specifier, resolved from the project root
    /// unless configured otherwise.
    pub fn specifier(&self) -> DevDepSpecifier {
        DevDepSpecifier::new(
            self.name.clone(),
            ProjectPath::new(self.resolve_from.as_deref().unwrap_or(".")),
        )
    }

    /// Each dev dependency paired with the context of this plugin.
    pub fn dev_dependencies(&self) -> Vec<(DevDepSpecifier, PluginContext)> {
        let plugin = self.specifier();
        self.dev_dependencies
            .iter()
            .map(|dep| {
                let resolve_from = match &dep.resolve_from {
                    Some(from) => ProjectPath::new(from),
                    None => plugin.resolve_from.clone(),
                };
                (
                    DevDepSpecifier::new(dep.specifier.clone(), resolve_from),
                    PluginContext::new(plugin.clone()).invalidate_parent(dep.invalidate_parent_on_change),
                )
            })
            .collect()
    }
}

impl PlugwatchConfig {
    /// Creates a new empty configuration.
    pub fn new() -> Self {
        Self {
            plugins: Vec::new(),
            cache: true,
            cache_dir: default_cache_dir(),
            base_dir: None,
        }
    }

    /// Loads configuration from a file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, DevDepError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            DevDepError::config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let mut config = Self::from_json(&content)?;
        if let Some(parent) = path.parent() {
            config.base_dir = Some(parent.to_path_buf());
        }

        Ok(config)
    }

    /// Parses configuration from JSON string with schema validation.
    pub fn from_json(json: &str) -> Result<Self, DevDepError> {
        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| DevDepError::config(format!("Invalid JSON: {}", e)))?;

        let schema = CONFIG_SCHEMA
            .get_or_init(|| {
                let schema_json: serde_json::Value = serde_json::from_str(SCHEMA_JSON)
                    .map_err(|e| format!("Invalid embedded config schema: {}", e))?;
                Validator::new(&schema_json)
                    .map_err(|e| format!("Invalid config schema compilation: {}", e))
            })
            .as_ref()
            .map_err(|e| DevDepError::config(e.clone()))?;

        if let Err(e) = schema.validate(&value) {
            return Err(DevDepError::config(format!(
                "Config validation failed: {} at {}",
                e,
                e.instance_path()
            )));
        }

        serde_json::from_value(value)
            .map_err(|e| DevDepError::config(format!("Invalid config: {}", e)))
    }

    /// Finds `.plugwatch.json` in `dir` or the nearest ancestor.
    pub fn discover(dir: &Path) -> Option<PathBuf> {
        dir.ancestors()
            .map(|ancestor| ancestor.join(CONFIG_FILE))
            .find(|candidate| candidate.is_file())
    }

    /// Root that project paths are relative to.
    pub fn project_root(&self) -> PathBuf {
        self.base_dir
            .clone()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Absolute location of the cache directory.
    pub fn cache_path(&self) -> PathBuf {
        self.project_root().join(&self.cache_dir)
    }

    /// Every configured dev dependency, in plugin order.
    pub fn dev_dependencies(&self) -> Vec<(DevDepSpecifier, PluginContext)> {
        self.plugins
            .iter()
            .flat_map(PluginConfig::dev_dependencies)
            .collect()
    }
}

impl Default for PlugwatchConfig {
    fn default() -> Self {
        Self::new()
    }
}
