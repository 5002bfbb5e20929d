//! Status command implementation

use miette::{IntoDiagnostic, Result};
use plugwatch_core::{DEV_DEP_REQUEST, StoredDevDep};
use plugwatch_graph::RequestGraph;
use serde_json::json;
use tracing::info;

use crate::cli::{Cli, OutputFormat};
use crate::commands::{cache_enabled, load_config};

/// Prints recorded dev dependencies with their validity.
///
/// Detected changes are applied in memory only. Returns whether any
/// dependency is stale.
pub fn run_status(cli: &Cli, format: OutputFormat) -> Result<bool> {
    let config = load_config(cli)?;
    if !cache_enabled(cli, &config) {
        return Err(miette::miette!(
            "Caching is disabled, there is no recorded state to report"
        ));
    }

    let graph = RequestGraph::load(config.project_root(), &config.cache_path()).into_diagnostic()?;
    graph.detect_changes();

    let mut entries = Vec::new();
    for request in graph.requests(DEV_DEP_REQUEST).into_diagnostic()? {
        let Some(result) = request.result else {
            continue;
        };
        let stored: StoredDevDep = serde_json::from_value(result).into_diagnostic()?;
        entries.push((stored, request.valid));
    }
    entries.sort_by(|(a, _), (b, _)| a.key().cmp(&b.key()));

    let stale = entries.iter().filter(|(_, valid)| !valid).count();
    match format {
        OutputFormat::Text => {
            for (stored, valid) in &entries {
                let state = if *valid { "valid" } else { "stale" };
                println!("{:<6}{}", state, stored.key());
            }
        }
        OutputFormat::Json => {
            let output: Vec<_> = entries
                .iter()
                .map(|(stored, valid)| {
                    json!({
                        "specifier": stored.specifier,
                        "resolveFrom": stored.resolve_from,
                        "hash": stored.hash,
                        "valid": valid,
                    })
                })
                .collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&output).into_diagnostic()?
            );
        }
    }

    info!("{} dev dependencies recorded, {} stale", entries.len(), stale);
    Ok(stale > 0)
}
