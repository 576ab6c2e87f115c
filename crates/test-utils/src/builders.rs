use std::path::{Path, PathBuf};

use kiln::graph::{BuildGraph, Project};
use tempfile::TempDir;

/// Fluent builder for [`Project`] fixtures.
#[derive(Debug, Clone)]
pub struct ProjectBuilder {
    name: String,
    sources: Vec<PathBuf>,
    classpath: Vec<PathBuf>,
    dependencies: Vec<String>,
    out_dir: PathBuf,
}

impl ProjectBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            sources: Vec::new(),
            classpath: Vec::new(),
            dependencies: Vec::new(),
            out_dir: PathBuf::from(format!("target/{name}")),
        }
    }

    pub fn source(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(path.into());
        self
    }

    pub fn classpath_entry(mut self, path: impl Into<PathBuf>) -> Self {
        self.classpath.push(path.into());
        self
    }

    pub fn depends_on(mut self, name: &str) -> Self {
        self.dependencies.push(name.to_string());
        self
    }

    pub fn out_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.out_dir = path.into();
        self
    }

    pub fn build(self) -> Project {
        Project {
            name: self.name,
            sources: self.sources,
            classpath: self.classpath,
            dependencies: self.dependencies,
            out_dir: self.out_dir,
        }
    }
}

/// A temporary on-disk workspace with per-project source and output
/// directories, for tests that exercise real hashing and watching.
#[derive(Debug)]
pub struct TestWorkspace {
    dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("creating test workspace"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Create a project with a real `src/` and `out/` directory under the
    /// workspace root, seeded with one source file.
    pub fn project(&self, name: &str, deps: &[&str]) -> Project {
        let src = self.dir.path().join(name).join("src");
        let out = self.dir.path().join(name).join("out");
        std::fs::create_dir_all(&src).expect("creating source dir");
        std::fs::create_dir_all(&out).expect("creating out dir");
        std::fs::write(src.join("Main.scala"), format!("object {name}\n"))
            .expect("seeding source file");

        let mut builder = ProjectBuilder::new(name).source(&src).out_dir(&out);
        for dep in deps {
            builder = builder.depends_on(dep);
        }
        builder.build()
    }

    /// Path to a source file of `project` (as created by [`Self::project`]).
    pub fn source_file(&self, project: &str, file: &str) -> PathBuf {
        self.dir.path().join(project).join("src").join(file)
    }

    /// Write (or overwrite) a source file for `project`.
    pub fn write_source(&self, project: &str, file: &str, contents: &str) {
        std::fs::write(self.source_file(project, file), contents)
            .expect("writing source file");
    }
}

impl Default for TestWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a validated graph from projects, panicking on fixture mistakes.
pub fn graph(projects: Vec<Project>) -> BuildGraph {
    BuildGraph::new(projects).expect("test fixture graph must be valid")
}
