//! # plugwatch_graph
//!
//! Persistent request graph for plugwatch.
//!
//! Requests are recorded against a top-level build request together with
//! the file conditions that make them stale. Between builds the graph diffs
//! a snapshot of those files against the disk, so a restarted process sees
//! the same validity a watcher would have reported.
//!
//! ## Storage
//!
//! The graph is stored with `rkyv` in `<cache_dir>/graph.rkyv`.

mod error;
mod graph;
mod snapshot;
mod state;
mod tracker;

pub use error::GraphError;
pub use graph::{BUILD_REQUEST, FsEvent, FsEventKind, RequestGraph, RequestInfo};
pub use tracker::RequestTracker;
