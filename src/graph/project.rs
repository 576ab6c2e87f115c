// src/graph/project.rs

//! Immutable project configuration as supplied by the (out-of-scope) loader.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Canonical project name type used throughout the crate.
pub type ProjectName = String;

/// A compilation unit with sources, classpath, and dependencies.
///
/// Projects are immutable once constructed for a build session. They are
/// created from external configuration and never mutated during a run; a
/// configuration change produces a new [`super::BuildGraph`], not an edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Unique within a workspace.
    pub name: ProjectName,
    /// Ordered source directories and files.
    pub sources: Vec<PathBuf>,
    /// Ordered classpath entries (jars or class directories), excluding
    /// dependency outputs which are resolved per build run.
    pub classpath: Vec<PathBuf>,
    /// Direct dependencies, in configured order.
    pub dependencies: Vec<ProjectName>,
    /// Where this project's compiled output lands; appended to the resolved
    /// classpath of its dependents.
    pub out_dir: PathBuf,
}
