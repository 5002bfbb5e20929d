//! Build cycles against a real request graph and an on-disk project.

use plugwatch_core::{
    BuildCycle, DevDepRequest, DevDepSpecifier, InvalidationLedger, LoadedPlugin, PluginContext,
    reconcile,
};
use plugwatch_graph::{FsEvent, FsEventKind, RequestGraph};
use plugwatch_integration_tests::Project;
use pretty_assertions::assert_eq;

fn babel_plugin_x() -> DevDepSpecifier {
    DevDepSpecifier::new("babel-plugin-x", "src")
}

fn transformer(name: &str) -> PluginContext {
    PluginContext::new(DevDepSpecifier::new(name, "."))
}

fn babel_project() -> Project {
    let project = Project::new();
    project.install("babel-plugin-x", "module.exports = 1;");
    project
}

/// Runs one plugin's share of a build and returns its dev dependency request.
async fn build_once(
    project: &Project,
    graph: &RequestGraph,
    ledger: &InvalidationLedger,
    plugin: &str,
) -> (DevDepRequest, Vec<DevDepSpecifier>) {
    let services = project.services();
    let tracker = graph.tracker(&format!("plugin:{}", plugin));
    let result = {
        let cycle = BuildCycle::begin(&tracker, &services, ledger).await.unwrap();
        let request = cycle
            .dev_dependency(&babel_plugin_x(), &transformer(plugin))
            .await
            .unwrap();
        (request, cycle.invalidated().to_vec())
    };
    tracker.finish();
    result
}

fn load_babel_plugin_x(project: &Project) {
    project
        .plugins
        .load("babel-plugin-x", || {
            Ok(LoadedPlugin {
                name: "babel-plugin-x".to_string(),
                entry: project.root().join("node_modules/babel-plugin-x/index.js"),
            })
        })
        .unwrap();
}

#[tokio::test]
async fn registered_hash_is_recovered_by_next_build() {
    let project = babel_project();
    let graph = RequestGraph::new(project.root());

    let (first, _) = build_once(&project, &graph, &InvalidationLedger::new(), "transformer-babel").await;
    assert!(!first.is_reused());

    let tracker = graph.tracker("plugin:transformer-babel");
    let reconciled = reconcile(&tracker).await.unwrap();
    assert_eq!(
        reconciled.dev_deps.get(&babel_plugin_x().key()),
        Some(&first.hash)
    );
    assert!(reconciled.invalid_dev_deps.is_empty());
}

#[tokio::test]
async fn unchanged_dependency_reuses_hash() {
    let project = babel_project();
    let graph = RequestGraph::new(project.root());

    let (first, _) = build_once(&project, &graph, &InvalidationLedger::new(), "transformer-babel").await;
    assert!(graph.detect_changes().is_empty());
    let (second, invalidated) =
        build_once(&project, &graph, &InvalidationLedger::new(), "transformer-babel").await;

    assert!(second.is_reused());
    assert_eq!(second.hash, first.hash);
    assert!(invalidated.is_empty());
}

#[tokio::test]
async fn changed_dependency_is_invalidated_and_rehashed() {
    let project = babel_project();
    let graph = RequestGraph::new(project.root());
    let (first, _) = build_once(&project, &graph, &InvalidationLedger::new(), "transformer-babel").await;
    load_babel_plugin_x(&project);

    project.write("node_modules/babel-plugin-x/index.js", "module.exports = 2;");
    let events = graph.detect_changes();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, FsEventKind::Update);

    let (second, invalidated) =
        build_once(&project, &graph, &InvalidationLedger::new(), "transformer-babel").await;

    assert_eq!(invalidated, vec![babel_plugin_x()]);
    assert!(project.plugins.get("babel-plugin-x").is_none());
    assert!(!second.is_reused());
    assert_ne!(second.hash, first.hash);
}

#[tokio::test]
async fn edit_after_hashing_is_detected() {
    let project = babel_project();
    let graph = RequestGraph::new(project.root());
    let services = project.services();
    let ledger = InvalidationLedger::new();

    let tracker = graph.tracker("plugin:transformer-babel");
    let first = {
        let cycle = BuildCycle::begin(&tracker, &services, &ledger).await.unwrap();
        let request = cycle
            .dev_dependency(&babel_plugin_x(), &transformer("transformer-babel"))
            .await
            .unwrap();
        project.write("node_modules/babel-plugin-x/index.js", "module.exports = 2;");
        request
    };
    tracker.finish();

    assert_eq!(
        graph.detect_changes(),
        vec![FsEvent::updated("node_modules/babel-plugin-x/index.js")]
    );

    let (second, invalidated) =
        build_once(&project, &graph, &InvalidationLedger::new(), "transformer-babel").await;
    assert_eq!(invalidated, vec![babel_plugin_x()]);
    assert!(!second.is_reused());
    assert_ne!(second.hash, first.hash);
}

#[tokio::test]
async fn shared_dependency_is_invalidated_once_per_build() {
    let project = babel_project();
    let graph = RequestGraph::new(project.root());
    let ledger = InvalidationLedger::new();
    build_once(&project, &graph, &ledger, "transformer-babel").await;
    build_once(&project, &graph, &ledger, "transformer-js").await;

    project.write("node_modules/babel-plugin-x/index.js", "module.exports = 2;");
    graph.detect_changes();
    load_babel_plugin_x(&project);

    let ledger = InvalidationLedger::new();
    let (_, first_invalidated) = build_once(&project, &graph, &ledger, "transformer-babel").await;
    assert_eq!(first_invalidated, vec![babel_plugin_x()]);
    assert!(project.plugins.get("babel-plugin-x").is_none());

    // Reloaded by the first plugin; the second one must not drop it again.
    load_babel_plugin_x(&project);
    let (_, second_invalidated) = build_once(&project, &graph, &ledger, "transformer-js").await;
    assert_eq!(second_invalidated, vec![babel_plugin_x()]);
    assert!(project.plugins.get("babel-plugin-x").is_some());
    assert_eq!(ledger.len(), 1);
}

#[tokio::test]
async fn closer_install_invalidates_dependency() {
    let project = babel_project();
    let graph = RequestGraph::new(project.root());
    let (first, _) = build_once(&project, &graph, &InvalidationLedger::new(), "transformer-babel").await;

    project.write("src/node_modules/babel-plugin-x/package.json", r#"{"name": "babel-plugin-x"}"#);
    project.write("src/node_modules/babel-plugin-x/index.js", "module.exports = 3;");
    let events = graph.detect_changes();
    assert!(events.iter().any(|e| e.kind == FsEventKind::Create));

    let (second, invalidated) =
        build_once(&project, &graph, &InvalidationLedger::new(), "transformer-babel").await;
    assert_eq!(invalidated, vec![babel_plugin_x()]);
    assert_ne!(second.hash, first.hash);
}

#[tokio::test]
async fn state_survives_save_and_load() {
    let project = babel_project();
    let cache_dir = project.cache_dir();
    let first = {
        let graph = RequestGraph::new(project.root());
        let (request, _) =
            build_once(&project, &graph, &InvalidationLedger::new(), "transformer-babel").await;
        graph.save(&cache_dir).unwrap();
        request
    };

    let graph = RequestGraph::load(project.root(), &cache_dir).unwrap();
    assert!(graph.detect_changes().is_empty());
    let (second, _) = build_once(&project, &graph, &InvalidationLedger::new(), "transformer-babel").await;
    assert!(second.is_reused());
    assert_eq!(second.hash, first.hash);

    project.write("node_modules/babel-plugin-x/index.js", "module.exports = 2;");
    let graph = RequestGraph::load(project.root(), &cache_dir).unwrap();
    assert!(!graph.detect_changes().is_empty());
    let (third, invalidated) =
        build_once(&project, &graph, &InvalidationLedger::new(), "transformer-babel").await;
    assert_eq!(invalidated, vec![babel_plugin_x()]);
    assert_ne!(third.hash, first.hash);
}
