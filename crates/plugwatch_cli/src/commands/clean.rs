//! Clean command implementation

use miette::{IntoDiagnostic, Result};
use plugwatch_graph::RequestGraph;
use tracing::info;

use crate::cli::Cli;
use crate::commands::load_config;

pub fn run_clean(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    let cache_dir = config.cache_path();

    if RequestGraph::remove_cache(&cache_dir).into_diagnostic()? {
        info!("Cache cleaned");
    } else {
        info!("No cache at {}", cache_dir.display());
    }
    Ok(())
}
