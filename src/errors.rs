// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum KilnError {
    #[error("Dependency cycle involving project '{0}'")]
    DependencyCycle(String),

    #[error("Project '{project}' depends on unknown project '{dependency}'")]
    MissingDependency { project: String, dependency: String },

    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("File watcher error: {0}")]
    WatcherIo(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, KilnError>;
