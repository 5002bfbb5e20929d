//! Command implementations

pub mod build;
pub mod clean;
pub mod status;

use miette::{IntoDiagnostic, Result};
use plugwatch_core::PlugwatchConfig;
use tracing::info;

use crate::cli::Cli;

/// Loads the config given with `--config`, or the nearest `.plugwatch.json`.
pub fn load_config(cli: &Cli) -> Result<PlugwatchConfig> {
    let mut config = if let Some(ref path) = cli.config {
        PlugwatchConfig::from_file(path).into_diagnostic()?
    } else if let Some(path) = PlugwatchConfig::discover(&std::env::current_dir().into_diagnostic()?) {
        info!("Using config: {}", path.display());
        PlugwatchConfig::from_file(&path).into_diagnostic()?
    } else {
        info!("No config file found, using defaults");
        PlugwatchConfig::new()
    };

    // Resolution walks ancestor directories, so the root must be absolute.
    config.base_dir = Some(config.project_root().canonicalize().into_diagnostic()?);
    Ok(config)
}

/// Whether the persisted graph is read and written.
pub fn cache_enabled(cli: &Cli, config: &PlugwatchConfig) -> bool {
    config.cache && !cli.no_cache
}
