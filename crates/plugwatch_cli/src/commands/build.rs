//! Build command implementation

use std::sync::Arc;

use miette::{IntoDiagnostic, Result};
use plugwatch_core::{
    BuildCycle, DevDepError, DevDepRequest, DevDepServices, FileHasher, InvalidationLedger,
    LoadedPlugin, LoadedPluginCache, NodeModulesResolver, PlugwatchConfig,
};
use plugwatch_graph::RequestGraph;
use tracing::info;

use crate::cli::Cli;
use crate::commands::{cache_enabled, load_config};
use crate::utils::create_tokio_runtime;

/// Dev dependencies tracked for one plugin.
struct PluginBuild {
    name: String,
    requests: Vec<DevDepRequest>,
    invalidated: usize,
}

pub fn run_build(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    let root = config.project_root();
    let cache_dir = config.cache_path();
    let use_cache = cache_enabled(cli, &config);

    let graph = if use_cache {
        RequestGraph::load(&root, &cache_dir).into_diagnostic()?
    } else {
        RequestGraph::new(&root)
    };

    let events = graph.detect_changes();
    if !events.is_empty() {
        info!("{} watched files changed since the last build", events.len());
    }

    let runtime = create_tokio_runtime()?;
    let builds = runtime
        .block_on(build_plugins(&config, &graph))
        .into_diagnostic()?;

    for build in &builds {
        println!("{}", build.name);
        for request in &build.requests {
            let state = if request.is_reused() { "reused" } else { "hashed" };
            println!("  {:<7}{} {}", state, request.key(), short_hash(&request.hash));
        }
    }

    let configured: Vec<String> = config
        .plugins
        .iter()
        .map(|plugin| plugin_request_id(&plugin.name))
        .collect();
    let removed = graph.retain_builds(&configured);
    if removed > 0 {
        info!("Dropped state of {} plugins removed from the config", removed);
    }

    let invalidated: usize = builds.iter().map(|b| b.invalidated).sum();
    info!(
        "Built {} plugins, {} dev dependencies invalidated",
        builds.len(),
        invalidated
    );

    if use_cache {
        graph.save(&cache_dir).into_diagnostic()?;
    }
    Ok(())
}

async fn build_plugins(
    config: &PlugwatchConfig,
    graph: &RequestGraph,
) -> Result<Vec<PluginBuild>, DevDepError> {
    let root = config.project_root();
    let resolver = Arc::new(NodeModulesResolver::new());
    let plugins = Arc::new(LoadedPluginCache::new());
    let services = DevDepServices::new(
        root.clone(),
        resolver.clone(),
        plugins.clone(),
        Arc::new(FileHasher::new(&root)),
    );
    let ledger = InvalidationLedger::new();

    let mut builds = Vec::with_capacity(config.plugins.len());
    for plugin in &config.plugins {
        let tracker = graph.tracker(&plugin_request_id(&plugin.name));
        let (requests, invalidated) = {
            let cycle = BuildCycle::begin(&tracker, &services, &ledger).await?;

            // Load after invalidation so a changed plugin is picked up fresh.
            let specifier = plugin.specifier();
            let entry = resolver
                .entry(&specifier.specifier, &specifier.resolve_from.to_absolute(&root))
                .await?;
            plugins.load(&plugin.name, || {
                Ok(LoadedPlugin {
                    name: plugin.name.clone(),
                    entry,
                })
            })?;

            let requests = cycle.dev_dependencies(&plugin.dev_dependencies()).await?;
            (requests, cycle.invalidated().len())
        };
        tracker.finish();

        builds.push(PluginBuild {
            name: plugin.name.clone(),
            requests,
            invalidated,
        });
    }

    Ok(builds)
}

/// Id of the build request that tracks one plugin's dev dependencies.
fn plugin_request_id(name: &str) -> String {
    format!("plugin:{}", name)
}

fn short_hash(hash: &str) -> &str {
    hash.get(..12).unwrap_or(hash)
}
