// src/compiler.rs

//! External compiler collaborator seam.
//!
//! The core treats the compiler as opaque except for its result shape: it
//! hands over a project, a fully resolved classpath, and a cancellation
//! token, and gets back a [`CompileOutput`].

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use tokio_util::sync::CancellationToken;

use crate::cache::CompileStatus;
use crate::graph::Project;

/// What an external compiler invocation reports back.
#[derive(Debug, Clone)]
pub struct CompileOutput {
    pub status: CompileStatus,
    pub artifacts: Vec<PathBuf>,
    pub diagnostics: Vec<String>,
}

impl CompileOutput {
    pub fn success(artifacts: Vec<PathBuf>) -> Self {
        Self {
            status: CompileStatus::Success,
            artifacts,
            diagnostics: Vec::new(),
        }
    }

    pub fn failure(diagnostics: Vec<String>) -> Self {
        Self {
            status: CompileStatus::Failure,
            artifacts: Vec::new(),
            diagnostics,
        }
    }

    pub fn cancelled() -> Self {
        Self {
            status: CompileStatus::Cancelled,
            artifacts: Vec::new(),
            diagnostics: Vec::new(),
        }
    }
}

/// External compiler invocation.
///
/// Implementations may be asynchronous and should honour the token; the
/// scheduler never calls this for a project whose cache key matched.
pub trait Compiler: Send + Sync {
    fn compile<'a>(
        &'a self,
        project: &'a Project,
        classpath: &'a [PathBuf],
        token: &'a CancellationToken,
    ) -> Pin<Box<dyn Future<Output = CompileOutput> + Send + 'a>>;
}

/// Resolve the classpath the compiler sees for `project`: dependency outputs
/// first (configured dependency order), then the project's own entries.
pub fn resolve_classpath(project: &Project, dep_out_dirs: &[&Path]) -> Vec<PathBuf> {
    let mut classpath = Vec::with_capacity(dep_out_dirs.len() + project.classpath.len());
    for dir in dep_out_dirs {
        classpath.push(dir.to_path_buf());
    }
    classpath.extend(project.classpath.iter().cloned());
    classpath
}
