//! # plugwatch_core
//!
//! Dev-dependency invalidation for incremental plugin builds.
//!
//! A build loads plugin code whose own files can change between builds. This
//! crate tracks those files per dev dependency and decides, at the start of
//! each build, which loaded plugins must be dropped and which hashes can be
//! reused from the previous build.
//!
//! This crate provides:
//! - Reconciliation of recorded dev dependencies against an incremental graph
//! - Hash computation with a fast path for provably unchanged dependencies
//! - At-most-once runtime cache invalidation per build
//! - Subrequest registration so the next build can replay the result
//!
//! ## Example
//!
//! ```rust,ignore
//! use plugwatch_core::{BuildCycle, DevDepServices, InvalidationLedger};
//!
//! let ledger = InvalidationLedger::new();
//! let cycle = BuildCycle::begin(&graph, &services, &ledger).await?;
//! for (dev_dep, plugin) in config.dev_dependencies() {
//!     let request = cycle.dev_dependency(&dev_dep, &plugin).await?;
//!     println!("{} {}", request.key(), request.hash);
//! }
//! ```

mod build;
mod config;
mod dependency;
mod error;
pub mod graph;
pub mod hash;
mod invalidate;
mod ledger;
pub mod module_resolver;
pub mod node_modules;
pub mod plugin_registry;
mod project_path;
mod reconcile;
mod register;
mod request;

pub use build::{BuildCycle, DevDepServices};
pub use config::{CONFIG_FILE, DevDependencyConfig, PluginConfig, PlugwatchConfig};
pub use dependency::{DevDepResolver, PluginContext};
pub use error::DevDepError;
pub use graph::{DEV_DEP_REQUEST, IncrementalGraph, Invalidation, Request, SubrequestRecord};
pub use hash::{FileHasher, FileSetHash, HashService};
pub use invalidate::InvalidationDeduper;
pub use ledger::InvalidationLedger;
pub use module_resolver::{ModuleResolver, ResolverInvalidations};
pub use node_modules::NodeModulesResolver;
pub use plugin_registry::{LoadedPlugin, LoadedPluginCache, PluginRegistry};
pub use project_path::ProjectPath;
pub use reconcile::{ReconciledDevDeps, reconcile};
pub use register::{DevDepSubrequest, register};
pub use request::{
    DevDepHashes, DevDepKey, DevDepRequest, DevDepSpecifier, FileCreateInvalidation,
    FileCreateRule, StoredDevDep,
};

#[cfg(test)]
pub mod test_utils;
