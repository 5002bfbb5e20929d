//! `node_modules` style module resolution.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use tracing::debug;

use crate::error::DevDepError;
use crate::module_resolver::{ModuleResolver, ResolverInvalidations};
use crate::request::FileCreateRule;

const PACKAGE_JSON: &str = "package.json";
const DEFAULT_ENTRY: &str = "index.js";

#[derive(Debug, Deserialize)]
struct PackageManifest {
    main: Option<String>,
}

#[derive(Debug, Clone)]
struct Resolution {
    entry: PathBuf,
    invalidations: ResolverInvalidations,
}

/// Resolves plugins from relative paths and ancestor `node_modules` directories.
///
/// Search order for a bare specifier `x` resolved from directory `d`:
/// 1. `d/node_modules/x/package.json`
/// 2. the same under each ancestor of `d`
///
/// The package entry is its `main` field, or `index.js`. Relative specifiers
/// resolve to the file itself, then with a `.js` extension, then to
/// `index.js` inside it.
#[derive(Default)]
pub struct NodeModulesResolver {
    cache: Mutex<HashMap<(String, PathBuf), Resolution>>,
}

impl NodeModulesResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the resolved entry file, resolving on a cache miss.
    pub async fn entry(&self, specifier: &str, from: &Path) -> Result<PathBuf, DevDepError> {
        Ok(self.lookup(specifier, from).await?.entry)
    }

    /// Number of cached resolutions.
    pub fn cached_len(&self) -> usize {
        self.cache.lock().len()
    }

    async fn lookup(&self, specifier: &str, from: &Path) -> Result<Resolution, DevDepError> {
        let key = (specifier.to_string(), from.to_path_buf());
        let cached = self.cache.lock().get(&key).cloned();
        if let Some(resolution) = cached {
            return Ok(resolution);
        }

        let dir = resolve_dir(from).await;
        let resolution = if is_relative(specifier) {
            resolve_relative(specifier, &dir).await?
        } else {
            resolve_package(specifier, &dir).await?
        };
        debug!(
            "Resolved '{}' from {} to {}",
            specifier,
            from.display(),
            resolution.entry.display()
        );

        self.cache.lock().insert(key, resolution.clone());
        Ok(resolution)
    }
}

#[async_trait]
impl ModuleResolver for NodeModulesResolver {
    async fn resolve(&self, specifier: &str, from: &Path) -> Result<(), DevDepError> {
        self.lookup(specifier, from).await.map(|_| ())
    }

    async fn invalidations(
        &self,
        specifier: &str,
        from: &Path,
    ) -> Result<ResolverInvalidations, DevDepError> {
        Ok(self.lookup(specifier, from).await?.invalidations)
    }

    fn invalidate(&self, specifier: &str, from: &Path) {
        let key = (specifier.to_string(), from.to_path_buf());
        if self.cache.lock().remove(&key).is_some() {
            debug!("Dropped resolution of '{}' from {}", specifier, from.display());
        }
    }
}

fn is_relative(specifier: &str) -> bool {
    specifier.starts_with("./") || specifier.starts_with("../") || Path::new(specifier).is_absolute()
}

/// A package name is one normal component, or two for a `@scope/name`.
fn is_valid_package_name(specifier: &str) -> bool {
    let components: Vec<Component<'_>> = Path::new(specifier).components().collect();
    let all_normal = components.iter().all(|c| matches!(c, Component::Normal(_)));
    match components.len() {
        1 => all_normal,
        2 => all_normal && specifier.starts_with('@'),
        _ => false,
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

async fn resolve_dir(from: &Path) -> PathBuf {
    match tokio::fs::metadata(from).await {
        Ok(metadata) if metadata.is_dir() => from.to_path_buf(),
        _ => from.parent().unwrap_or(from).to_path_buf(),
    }
}

async fn resolve_relative(specifier: &str, dir: &Path) -> Result<Resolution, DevDepError> {
    let base = dir.join(specifier);
    let candidates = [
        base.clone(),
        base.with_extension("js"),
        base.join(DEFAULT_ENTRY),
    ];

    for candidate in candidates {
        if is_file(&candidate).await {
            return Ok(Resolution {
                invalidations: ResolverInvalidations {
                    on_file_change: vec![candidate.clone()],
                    on_file_create: Vec::new(),
                },
                entry: candidate,
            });
        }
    }

    Err(DevDepError::resolution(
        specifier,
        dir.display().to_string(),
        "Cannot find file",
    ))
}

async fn resolve_package(specifier: &str, dir: &Path) -> Result<Resolution, DevDepError> {
    if !is_valid_package_name(specifier) {
        return Err(DevDepError::resolution(
            specifier,
            dir.display().to_string(),
            "Invalid package name",
        ));
    }

    for ancestor in dir.ancestors() {
        let package_dir = ancestor.join("node_modules").join(specifier);
        let package_json = package_dir.join(PACKAGE_JSON);
        if !is_file(&package_json).await {
            continue;
        }

        let content = tokio::fs::read_to_string(&package_json).await?;
        let manifest: PackageManifest = serde_json::from_str(&content).map_err(|e| {
            DevDepError::resolution(
                specifier,
                dir.display().to_string(),
                format!("Invalid {}: {}", package_json.display(), e),
            )
        })?;

        let entry = package_dir.join(manifest.main.as_deref().unwrap_or(DEFAULT_ENTRY));
        if !is_file(&entry).await {
            return Err(DevDepError::resolution(
                specifier,
                dir.display().to_string(),
                format!("Package entry {} does not exist", entry.display()),
            ));
        }

        // A copy installed closer to `dir` would shadow this one.
        let on_file_create = vec![FileCreateRule::FileName {
            file_name: format!("node_modules/{}", specifier),
            above_file_path: dir.to_path_buf(),
        }];

        return Ok(Resolution {
            invalidations: ResolverInvalidations {
                on_file_change: vec![package_json, entry.clone()],
                on_file_create,
            },
            entry,
        });
    }

    Err(DevDepError::resolution(
        specifier,
        dir.display().to_string(),
        "Cannot find module",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    fn install_package(root: &Path, name: &str, main: Option<&str>) -> PathBuf {
        let package_dir = root.join("node_modules").join(name);
        fs::create_dir_all(&package_dir).unwrap();
        let manifest = match main {
            Some(main) => format!(r#"{{"name": "{}", "main": "{}"}}"#, name, main),
            None => format!(r#"{{"name": "{}"}}"#, name),
        };
        fs::write(package_dir.join(PACKAGE_JSON), manifest).unwrap();
        let entry = package_dir.join(main.unwrap_or(DEFAULT_ENTRY));
        fs::create_dir_all(entry.parent().unwrap()).unwrap();
        fs::write(&entry, "module.exports = {};").unwrap();
        entry
    }

    #[tokio::test]
    async fn test_resolve_package_from_ancestor() {
        let dir = tempdir().unwrap();
        let entry = install_package(dir.path(), "babel-plugin-x", Some("lib/main.js"));
        let src = dir.path().join("src");
        fs::create_dir_all(&src).unwrap();

        let resolver = NodeModulesResolver::new();
        let invalidations = resolver.invalidations("babel-plugin-x", &src).await.unwrap();

        assert_eq!(
            invalidations.on_file_change,
            vec![
                dir.path().join("node_modules/babel-plugin-x/package.json"),
                entry,
            ]
        );
        assert_eq!(
            invalidations.on_file_create,
            vec![FileCreateRule::FileName {
                file_name: "node_modules/babel-plugin-x".to_string(),
                above_file_path: src,
            }]
        );
    }

    #[tokio::test]
    async fn test_resolve_package_default_entry() {
        let dir = tempdir().unwrap();
        let entry = install_package(dir.path(), "plugin", None);

        let resolver = NodeModulesResolver::new();
        assert_eq!(resolver.entry("plugin", dir.path()).await.unwrap(), entry);
    }

    #[tokio::test]
    async fn test_resolve_from_file_uses_parent_dir() {
        let dir = tempdir().unwrap();
        let entry = install_package(dir.path(), "plugin", None);
        let config = dir.path().join(".plugwatch.json");
        fs::write(&config, "{}").unwrap();

        let resolver = NodeModulesResolver::new();
        assert_eq!(resolver.entry("plugin", &config).await.unwrap(), entry);
    }

    #[tokio::test]
    async fn test_resolve_relative_with_extension() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("local-plugin.js");
        fs::write(&file, "").unwrap();

        let resolver = NodeModulesResolver::new();
        let invalidations = resolver
            .invalidations("./local-plugin", dir.path())
            .await
            .unwrap();
        assert_eq!(invalidations.on_file_change, vec![file]);
        assert!(invalidations.on_file_create.is_empty());
    }

    #[tokio::test]
    async fn test_resolve_missing_package() {
        let dir = tempdir().unwrap();
        let resolver = NodeModulesResolver::new();

        let result = resolver.resolve("missing", dir.path()).await;
        match result {
            Err(DevDepError::Resolution { specifier, message, .. }) => {
                assert_eq!(specifier, "missing");
                assert_eq!(message, "Cannot find module");
            }
            other => panic!("Expected Resolution error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_resolve_rejects_traversal() {
        let dir = tempdir().unwrap();
        let resolver = NodeModulesResolver::new();

        for name in ["a/b", "..", "a/../b"] {
            assert!(resolver.resolve(name, dir.path()).await.is_err(), "{}", name);
        }
    }

    #[tokio::test]
    async fn test_resolve_scoped_package() {
        let dir = tempdir().unwrap();
        let entry = install_package(dir.path(), "@scope/plugin", None);

        let resolver = NodeModulesResolver::new();
        assert_eq!(resolver.entry("@scope/plugin", dir.path()).await.unwrap(), entry);
    }

    #[tokio::test]
    async fn test_invalidate_drops_cached_resolution() {
        let dir = tempdir().unwrap();
        install_package(dir.path(), "plugin", None);

        let resolver = NodeModulesResolver::new();
        resolver.resolve("plugin", dir.path()).await.unwrap();
        assert_eq!(resolver.cached_len(), 1);

        resolver.invalidate("plugin", dir.path());
        assert_eq!(resolver.cached_len(), 0);
    }

    #[tokio::test]
    async fn test_cached_resolution_survives_removal_until_invalidated() {
        let dir = tempdir().unwrap();
        install_package(dir.path(), "plugin", None);

        let resolver = NodeModulesResolver::new();
        resolver.resolve("plugin", dir.path()).await.unwrap();
        fs::remove_dir_all(dir.path().join("node_modules")).unwrap();

        assert!(resolver.resolve("plugin", dir.path()).await.is_ok());
        resolver.invalidate("plugin", dir.path());
        assert!(resolver.resolve("plugin", dir.path()).await.is_err());
    }
}
