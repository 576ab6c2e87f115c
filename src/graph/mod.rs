// src/graph/mod.rs

//! Project model and the build dependency graph.
//!
//! - [`project`] holds the immutable per-project configuration view.
//! - [`build_graph`] holds the validated DAG with reachability and
//!   topological-order queries used by the scheduler and the watcher.

pub mod build_graph;
pub mod project;

pub use build_graph::BuildGraph;
pub use project::{Project, ProjectName};
