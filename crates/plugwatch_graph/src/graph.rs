//! The request graph.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use plugwatch_core::ProjectPath;
use tracing::{debug, info};

use crate::error::GraphError;
use crate::snapshot;
use crate::state::{CreateRule, GraphState, RequestNode, StoredInvalidation};
use crate::tracker::RequestTracker;

/// Kind of the top-level requests that trackers are scoped to.
pub const BUILD_REQUEST: &str = "build_request";

const GRAPH_FILE: &str = "graph.rkyv";

/// What happened to a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsEventKind {
    Create,
    Update,
    Delete,
}

/// A filesystem change, in project-relative form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsEvent {
    pub kind: FsEventKind,
    pub path: ProjectPath,
}

impl FsEvent {
    pub fn created(path: impl Into<ProjectPath>) -> Self {
        Self {
            kind: FsEventKind::Create,
            path: path.into(),
        }
    }

    pub fn updated(path: impl Into<ProjectPath>) -> Self {
        Self {
            kind: FsEventKind::Update,
            path: path.into(),
        }
    }

    pub fn deleted(path: impl Into<ProjectPath>) -> Self {
        Self {
            kind: FsEventKind::Delete,
            path: path.into(),
        }
    }

    fn fires(&self, invalidation: &StoredInvalidation) -> bool {
        let path = self.path.as_str();
        match (self.kind, invalidation) {
            // A file replaced by a new one has changed too.
            (FsEventKind::Update | FsEventKind::Create, StoredInvalidation::FileUpdate(watched)) => {
                watched == path
            }
            (FsEventKind::Delete, StoredInvalidation::FileDelete(watched)) => watched == path,
            (FsEventKind::Create, StoredInvalidation::Create(rule)) => {
                snapshot::is_created_match(rule, path)
            }
            _ => false,
        }
    }
}

/// A request as seen from outside the graph.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestInfo {
    pub id: String,
    pub valid: bool,
    pub result: Option<serde_json::Value>,
}

/// Incremental request graph with file-based invalidation.
///
/// Requests are recorded as subrequests of a top-level build request through
/// a [`RequestTracker`]. A request stays valid until one of its invalidations
/// fires, and invalidity propagates to every request that ran it.
pub struct RequestGraph {
    root: PathBuf,
    /// Left out of glob walks.
    cache_dir: Option<PathBuf>,
    pub(crate) state: RwLock<GraphState>,
}

impl RequestGraph {
    /// Creates an empty graph for the project at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache_dir: None,
            state: RwLock::new(GraphState::default()),
        }
    }

    /// Loads the graph persisted in `cache_dir`, or an empty graph if none.
    pub fn load(root: impl Into<PathBuf>, cache_dir: &Path) -> Result<Self, GraphError> {
        let mut graph = Self::new(root);
        graph.cache_dir = Some(cache_dir.to_path_buf());
        let graph_file = cache_dir.join(GRAPH_FILE);

        if !graph_file.exists() {
            debug!("No graph file found at {}", graph_file.display());
            return Ok(graph);
        }

        let content = fs::read(&graph_file)?;
        let state: GraphState = rkyv::from_bytes::<_, rkyv::rancor::Error>(&content)
            .map_err(|e| GraphError::corrupted(e.to_string()))?;

        info!("Loaded {} requests", state.nodes.len());
        *graph.state.write() = state;
        Ok(graph)
    }

    /// Saves the graph to `cache_dir`.
    pub fn save(&self, cache_dir: &Path) -> Result<(), GraphError> {
        fs::create_dir_all(cache_dir)?;

        let graph_file = cache_dir.join(GRAPH_FILE);
        let state = self.state.read();
        let bytes = rkyv::to_bytes::<rkyv::rancor::Error>(&*state)
            .map_err(|e| GraphError::Serialization(e.to_string()))?;

        fs::write(&graph_file, bytes)?;

        info!(
            "Saved {} requests to {}",
            state.nodes.len(),
            graph_file.display()
        );
        Ok(())
    }

    /// Deletes the persisted graph in `cache_dir`. Returns whether one existed.
    pub fn remove_cache(cache_dir: &Path) -> Result<bool, GraphError> {
        if !cache_dir.exists() {
            return Ok(false);
        }
        fs::remove_dir_all(cache_dir)?;
        info!("Removed {}", cache_dir.display());
        Ok(true)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.state.read().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().nodes.is_empty()
    }

    pub fn is_valid(&self, id: &str) -> bool {
        self.state.read().nodes.get(id).is_some_and(|node| node.valid)
    }

    /// Starts recording subrequests of the build request `parent_id`.
    pub fn tracker(&self, parent_id: &str) -> RequestTracker<'_> {
        self.state
            .write()
            .nodes
            .entry(parent_id.to_string())
            .or_insert_with(|| RequestNode::new(BUILD_REQUEST));
        RequestTracker::new(self, parent_id)
    }

    /// Requests of `kind`, sorted by id.
    pub fn requests(&self, kind: &str) -> Result<Vec<RequestInfo>, GraphError> {
        let state = self.state.read();
        let mut requests = state
            .nodes
            .iter()
            .filter(|(_, node)| node.kind == kind)
            .map(|(id, node)| {
                Ok(RequestInfo {
                    id: id.clone(),
                    valid: node.valid,
                    result: parse_result(id, node)?,
                })
            })
            .collect::<Result<Vec<_>, GraphError>>()?;
        requests.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(requests)
    }

    /// Drops build requests not named in `keep`, with every request only
    /// they reached. Returns the number of build requests removed.
    pub fn retain_builds(&self, keep: &[String]) -> usize {
        let removed = {
            let mut state = self.state.write();
            let before = state.nodes.len();
            state
                .nodes
                .retain(|id, node| node.kind != BUILD_REQUEST || keep.contains(id));
            before - state.nodes.len()
        };
        if removed > 0 {
            info!("Removed {} build requests no longer configured", removed);
            self.collect_garbage();
        }
        removed
    }

    /// Invalidates every request whose invalidations match one of `events`.
    ///
    /// Returns the ids that became invalid, parents included.
    pub fn respond_to_fs_events(&self, events: &[FsEvent]) -> Vec<String> {
        if events.is_empty() {
            return Vec::new();
        }

        let mut state = self.state.write();
        let fired: Vec<String> = state
            .nodes
            .iter()
            .filter(|(_, node)| node.valid)
            .filter(|(_, node)| {
                node.invalidations
                    .iter()
                    .any(|inv| events.iter().any(|event| event.fires(inv)))
            })
            .map(|(id, _)| id.clone())
            .collect();

        let invalidated = invalidate(&mut state, fired);
        if !invalidated.is_empty() {
            info!(
                "{} file events invalidated {} requests",
                events.len(),
                invalidated.len()
            );
        }
        invalidated
    }

    /// Compares watched files and creation rules against the last snapshot,
    /// applies the resulting events and refreshes the snapshot.
    pub fn detect_changes(&self) -> Vec<FsEvent> {
        let (files, rules) = {
            let state = self.state.read();
            let files: Vec<(String, Option<String>)> = state
                .files
                .iter()
                .map(|(path, hash)| (path.clone(), hash.clone()))
                .collect();
            (files, watched_rules(state.nodes.values()))
        };

        let mut events = Vec::new();
        let mut file_updates = Vec::with_capacity(files.len());
        for (path, previous) in files {
            let current = snapshot::hash_file(&ProjectPath::new(path.as_str()).to_absolute(&self.root));
            match (&previous, &current) {
                (Some(_), None) => events.push(FsEvent::deleted(path.as_str())),
                (None, Some(_)) => events.push(FsEvent::created(path.as_str())),
                (Some(before), Some(after)) if before != after => {
                    events.push(FsEvent::updated(path.as_str()))
                }
                _ => {}
            }
            file_updates.push((path, current));
        }

        let match_updates = snapshot::create_matches(&self.root, &rules, self.cache_dir.as_deref());
        {
            let state = self.state.read();
            for (key, current) in &match_updates {
                if let Some(known) = state.create_matches.get(key) {
                    for path in current.iter().filter(|path| !known.contains(path)) {
                        let event = FsEvent::created(path.as_str());
                        if !events.contains(&event) {
                            events.push(event);
                        }
                    }
                }
            }
        }

        {
            let mut state = self.state.write();
            state.files.extend(file_updates);
            state.create_matches.extend(match_updates);
        }

        debug!("Detected {} file events", events.len());
        self.respond_to_fs_events(&events);
        events
    }

    /// Records the baseline of files and rules watched by request `id`.
    ///
    /// Digests in `observed` are what the request read to produce its result
    /// and take precedence over the disk, so an edit made after that read is
    /// still reported by the next [`RequestGraph::detect_changes`]. A watched
    /// file whose recorded digest moved on invalidates the other requests
    /// watching it.
    pub(crate) fn snapshot_request(&self, id: &str, observed: &BTreeMap<ProjectPath, String>) {
        let (paths, rules) = {
            let state = self.state.read();
            let Some(node) = state.nodes.get(id) else {
                return;
            };
            let mut paths: Vec<String> = node
                .invalidations
                .iter()
                .filter_map(|inv| inv.watched_file().map(str::to_string))
                .collect();
            paths.sort();
            paths.dedup();
            (paths, watched_rules(std::iter::once(node)))
        };

        let files: Vec<(String, Option<String>)> = paths
            .into_iter()
            .map(|path| {
                let project_path = ProjectPath::new(path.as_str());
                let digest = match observed.get(&project_path) {
                    Some(digest) => Some(digest.clone()),
                    None => snapshot::hash_file(&project_path.to_absolute(&self.root)),
                };
                (path, digest)
            })
            .collect();
        let matches = snapshot::create_matches(&self.root, &rules, self.cache_dir.as_deref());

        let mut state = self.state.write();
        let moved: Vec<FsEvent> = files
            .iter()
            .filter(|(path, digest)| state.files.get(path).is_some_and(|known| known != digest))
            .map(|(path, _)| FsEvent::updated(path.as_str()))
            .collect();
        state.files.extend(files);
        state.create_matches.extend(matches);

        if !moved.is_empty() {
            let fired: Vec<String> = state
                .nodes
                .iter()
                .filter(|(other, node)| other.as_str() != id && node.valid)
                .filter(|(_, node)| {
                    node.invalidations
                        .iter()
                        .any(|inv| moved.iter().any(|event| event.fires(inv)))
                })
                .map(|(other, _)| other.clone())
                .collect();
            let invalidated = invalidate(&mut state, fired);
            debug!(
                "Request '{}' saw {} files change under {} other requests",
                id,
                moved.len(),
                invalidated.len()
            );
        }
    }

    /// Drops requests no build request reaches, and snapshots nothing watches.
    pub(crate) fn collect_garbage(&self) {
        let mut state = self.state.write();

        let mut reachable: HashSet<String> = HashSet::new();
        let mut stack: Vec<String> = state
            .nodes
            .iter()
            .filter(|(_, node)| node.kind == BUILD_REQUEST)
            .map(|(id, _)| id.clone())
            .collect();
        while let Some(id) = stack.pop() {
            if !reachable.insert(id.clone()) {
                continue;
            }
            if let Some(node) = state.nodes.get(&id) {
                stack.extend(node.subrequests.iter().cloned());
            }
        }

        let before = state.nodes.len();
        state.nodes.retain(|id, _| reachable.contains(id));

        let watched_files: HashSet<String> = state
            .nodes
            .values()
            .flat_map(|node| node.invalidations.iter())
            .filter_map(|inv| inv.watched_file().map(str::to_string))
            .collect();
        let watched_keys: HashSet<String> = watched_rules(state.nodes.values())
            .iter()
            .map(CreateRule::key)
            .collect();
        state.files.retain(|path, _| watched_files.contains(path));
        state.create_matches.retain(|key, _| watched_keys.contains(key));

        let removed = before - state.nodes.len();
        if removed > 0 {
            debug!("Removed {} unreachable requests", removed);
        }
    }
}

pub(crate) fn parse_result(
    id: &str,
    node: &RequestNode,
) -> Result<Option<serde_json::Value>, GraphError> {
    node.result
        .as_deref()
        .map(|text| {
            serde_json::from_str(text)
                .map_err(|e| GraphError::corrupted(format!("Result of '{}': {}", id, e)))
        })
        .transpose()
}

fn watched_rules<'a>(nodes: impl Iterator<Item = &'a RequestNode>) -> Vec<CreateRule> {
    let mut rules: Vec<CreateRule> = Vec::new();
    for node in nodes {
        for inv in &node.invalidations {
            if let StoredInvalidation::Create(rule) = inv
                && !rules.contains(rule)
            {
                rules.push(rule.clone());
            }
        }
    }
    rules
}

/// Marks `ids` invalid and propagates to their parents.
fn invalidate(state: &mut GraphState, ids: Vec<String>) -> Vec<String> {
    let mut parents: HashMap<&str, Vec<String>> = HashMap::new();
    for (id, node) in &state.nodes {
        for child in &node.subrequests {
            parents.entry(child.as_str()).or_default().push(id.clone());
        }
    }

    let mut invalidated = Vec::new();
    let mut queue = ids;
    let mut affected: Vec<String> = Vec::new();
    while let Some(id) = queue.pop() {
        if affected.contains(&id) {
            continue;
        }
        if let Some(ups) = parents.get(id.as_str()) {
            queue.extend(ups.iter().cloned());
        }
        affected.push(id);
    }
    drop(parents);

    for id in affected {
        if let Some(node) = state.nodes.get_mut(&id)
            && node.valid
        {
            node.valid = false;
            debug!("Invalidated request '{}'", id);
            invalidated.push(id);
        }
    }
    invalidated.sort();
    invalidated
}
