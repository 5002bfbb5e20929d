//! Recording fakes for the collaborator traits.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::DevDepError;
use crate::graph::{IncrementalGraph, Invalidation, Request, SubrequestRecord};
use crate::hash::{FileSetHash, HashService, content_digest};
use crate::module_resolver::{ModuleResolver, ResolverInvalidations};
use crate::plugin_registry::PluginRegistry;
use crate::project_path::ProjectPath;
use crate::request::{FileCreateRule, StoredDevDep};

#[derive(Debug, Clone)]
struct FakeNode {
    id: String,
    kind: String,
    valid: bool,
    result: Option<serde_json::Value>,
    invalidations: Vec<Invalidation>,
}

/// In-memory graph that records every request execution.
#[derive(Default)]
pub struct FakeGraph {
    nodes: Mutex<Vec<FakeNode>>,
    executions: Mutex<Vec<String>>,
    hide_results: bool,
}

impl FakeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// A graph whose `subrequests` omit results, forcing `request_result` lookups.
    pub fn without_inline_results() -> Self {
        Self {
            hide_results: true,
            ..Self::default()
        }
    }

    pub fn insert(&self, id: &str, kind: &str, result: Option<serde_json::Value>, valid: bool) {
        self.nodes.lock().push(FakeNode {
            id: id.to_string(),
            kind: kind.to_string(),
            valid,
            result,
            invalidations: Vec::new(),
        });
    }

    /// Records a dev dependency subrequest as a previous build would have.
    pub fn record_dev_dep(&self, stored: &StoredDevDep, valid: bool) -> String {
        let id = format!(
            "{}:{}:{}",
            crate::graph::DEV_DEP_REQUEST,
            stored.specifier,
            stored.hash
        );
        let result = serde_json::to_value(stored).ok();
        self.insert(&id, crate::graph::DEV_DEP_REQUEST, result, valid);
        id
    }

    pub fn invalidate(&self, id: &str) {
        for node in self.nodes.lock().iter_mut().filter(|n| n.id == id) {
            node.valid = false;
        }
    }

    pub fn executions(&self) -> Vec<String> {
        self.executions.lock().clone()
    }

    pub fn invalidations_of(&self, id: &str) -> Option<Vec<Invalidation>> {
        self.nodes
            .lock()
            .iter()
            .find(|n| n.id == id)
            .map(|n| n.invalidations.clone())
    }

    pub fn len(&self) -> usize {
        self.nodes.lock().len()
    }
}

#[async_trait]
impl IncrementalGraph for FakeGraph {
    async fn subrequests(&self, kind: &str) -> Result<Vec<SubrequestRecord>, DevDepError> {
        Ok(self
            .nodes
            .lock()
            .iter()
            .filter(|n| n.kind == kind)
            .map(|n| SubrequestRecord {
                id: n.id.clone(),
                result: if self.hide_results { None } else { n.result.clone() },
            })
            .collect())
    }

    fn is_valid(&self, id: &str) -> bool {
        self.nodes.lock().iter().any(|n| n.id == id && n.valid)
    }

    async fn run_request(&self, request: &dyn Request) -> Result<(), DevDepError> {
        let id = request.id();
        if self.is_valid(&id) {
            return Ok(());
        }

        let invalidations = request.invalidations()?;
        let result = request.execute()?;
        self.executions.lock().push(id.clone());

        let mut nodes = self.nodes.lock();
        nodes.retain(|n| n.id != id);
        nodes.push(FakeNode {
            id,
            kind: request.kind().to_string(),
            valid: true,
            result: Some(result),
            invalidations,
        });
        Ok(())
    }

    async fn request_result(&self, id: &str) -> Result<Option<serde_json::Value>, DevDepError> {
        Ok(self
            .nodes
            .lock()
            .iter()
            .find(|n| n.id == id)
            .and_then(|n| n.result.clone()))
    }
}

/// Resolver over a fixed set of packages, recording every call.
pub struct FakeResolver {
    root: PathBuf,
    packages: Mutex<HashMap<String, ResolverInvalidations>>,
    calls: Mutex<Vec<String>>,
    invalidated: Mutex<Vec<(String, PathBuf)>>,
}

impl FakeResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            packages: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            invalidated: Mutex::new(Vec::new()),
        }
    }

    /// Adds a package depending on `files`, relative to the root.
    pub fn with_package(self, specifier: &str, files: &[&str]) -> Self {
        let invalidations = ResolverInvalidations {
            on_file_change: files.iter().map(|f| self.root.join(f)).collect(),
            on_file_create: vec![FileCreateRule::FileName {
                file_name: format!("node_modules/{}", specifier),
                above_file_path: self.root.clone(),
            }],
        };
        self.packages
            .lock()
            .insert(specifier.to_string(), invalidations);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn invalidated(&self) -> Vec<(String, PathBuf)> {
        self.invalidated.lock().clone()
    }

    fn lookup(&self, specifier: &str, from: &Path) -> Result<ResolverInvalidations, DevDepError> {
        self.packages.lock().get(specifier).cloned().ok_or_else(|| {
            DevDepError::resolution(specifier, from.display().to_string(), "Cannot find module")
        })
    }
}

#[async_trait]
impl ModuleResolver for FakeResolver {
    async fn resolve(&self, specifier: &str, from: &Path) -> Result<(), DevDepError> {
        self.calls.lock().push(format!("resolve:{}", specifier));
        self.lookup(specifier, from).map(|_| ())
    }

    async fn invalidations(
        &self,
        specifier: &str,
        from: &Path,
    ) -> Result<ResolverInvalidations, DevDepError> {
        self.calls.lock().push(format!("invalidations:{}", specifier));
        self.lookup(specifier, from)
    }

    fn invalidate(&self, specifier: &str, from: &Path) {
        self.invalidated
            .lock()
            .push((specifier.to_string(), from.to_path_buf()));
    }
}

/// Registry that records invalidated plugin names.
#[derive(Default)]
pub struct FakeRegistry {
    invalidated: Mutex<Vec<String>>,
}

impl FakeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn invalidated(&self) -> Vec<String> {
        self.invalidated.lock().clone()
    }
}

impl PluginRegistry for FakeRegistry {
    fn invalidate_plugin(&self, specifier: &str) {
        self.invalidated.lock().push(specifier.to_string());
    }
}

/// Hasher over path names only, counting calls.
#[derive(Default)]
pub struct FakeHasher {
    calls: AtomicUsize,
}

impl FakeHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HashService for FakeHasher {
    async fn hash_files(&self, files: &[ProjectPath]) -> Result<FileSetHash, DevDepError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let files: BTreeMap<ProjectPath, String> = files
            .iter()
            .map(|f| (f.clone(), content_digest(f.as_str().as_bytes())))
            .collect();
        let names: Vec<&str> = files.keys().map(|f| f.as_str()).collect();
        Ok(FileSetHash {
            hash: content_digest(names.join("\n").as_bytes()),
            files,
        })
    }
}
