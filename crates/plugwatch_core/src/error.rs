//! Dev dependency error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while tracking dev dependencies.
#[derive(Debug, Error)]
pub enum DevDepError {
    /// The module resolver could not locate a dev dependency.
    #[error(
        "Failed to resolve '{specifier}' from '{resolve_from}'{}: {message}",
        requested_by(.plugin)
    )]
    Resolution {
        specifier: String,
        resolve_from: String,
        /// Plugin that requested the dependency, when known.
        plugin: Option<String>,
        message: String,
    },

    /// A file that feeds a dev dependency hash could not be read.
    #[error("Failed to hash {}: {source}", .path.display())]
    Hash {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A stored request result does not have the expected shape.
    #[error("Graph inconsistency: {0}")]
    GraphInconsistency(String),

    /// The incremental graph failed outside of a result shape problem.
    #[error("Graph error: {0}")]
    Graph(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn requested_by(plugin: &Option<String>) -> String {
    match plugin {
        Some(name) => format!(" (requested by plugin '{}')", name),
        None => String::new(),
    }
}

impl DevDepError {
    /// Creates a resolution error.
    pub fn resolution(
        specifier: impl Into<String>,
        resolve_from: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Resolution {
            specifier: specifier.into(),
            resolve_from: resolve_from.into(),
            plugin: None,
            message: message.into(),
        }
    }

    /// Creates a graph inconsistency error.
    pub fn inconsistency(message: impl Into<String>) -> Self {
        Self::GraphInconsistency(message.into())
    }

    /// Creates a graph error.
    pub fn graph(message: impl Into<String>) -> Self {
        Self::Graph(message.into())
    }

    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Attaches the requesting plugin to a resolution error.
    ///
    /// Other variants are returned unchanged, as is a resolution error that
    /// already names a plugin.
    pub fn with_plugin(self, name: &str) -> Self {
        match self {
            Self::Resolution {
                specifier,
                resolve_from,
                plugin: None,
                message,
            } => Self::Resolution {
                specifier,
                resolve_from,
                plugin: Some(name.to_string()),
                message,
            },
            other => other,
        }
    }
}
