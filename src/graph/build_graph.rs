// src/graph/build_graph.rs

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::errors::{KilnError, Result};
use crate::graph::project::{Project, ProjectName};

/// Immutable, acyclic graph of projects with their dependency edges.
///
/// Validated at construction: every referenced dependency must resolve to a
/// project in the same graph, and the dependency relation must be acyclic.
/// A constructed graph never fails afterwards; configuration changes rebuild
/// the graph rather than mutating it.
#[derive(Debug, Clone)]
pub struct BuildGraph {
    projects: HashMap<ProjectName, Project>,
    /// Direct dependents per project (reverse edges), populated at build time.
    dependents: HashMap<ProjectName, Vec<ProjectName>>,
    /// Insertion order of projects, kept for deterministic iteration.
    order: Vec<ProjectName>,
}

impl BuildGraph {
    /// Build and validate a graph from a set of projects.
    ///
    /// Fails with [`KilnError::MissingDependency`] if a project references a
    /// dependency not present in `projects`, or [`KilnError::DependencyCycle`]
    /// if the dependency relation has a cycle. Either error is fatal before
    /// any build executes.
    pub fn new(projects: Vec<Project>) -> Result<Self> {
        let mut by_name: HashMap<ProjectName, Project> = HashMap::new();
        let mut order = Vec::with_capacity(projects.len());

        for project in projects {
            order.push(project.name.clone());
            by_name.insert(project.name.clone(), project);
        }

        let mut dependents: HashMap<ProjectName, Vec<ProjectName>> = HashMap::new();
        for name in &order {
            dependents.entry(name.clone()).or_default();
        }

        // Resolve every dependency reference and populate reverse edges.
        for name in &order {
            let project = &by_name[name];
            for dep in &project.dependencies {
                if !by_name.contains_key(dep) {
                    return Err(KilnError::MissingDependency {
                        project: name.clone(),
                        dependency: dep.clone(),
                    });
                }
                dependents
                    .entry(dep.clone())
                    .or_default()
                    .push(name.clone());
            }
        }

        // Cycle detection via petgraph; the adjacency maps above are what the
        // scheduler actually traverses.
        let mut pg: DiGraph<&str, ()> = DiGraph::new();
        let mut indices: HashMap<&str, NodeIndex> = HashMap::new();
        for name in &order {
            indices.insert(name.as_str(), pg.add_node(name.as_str()));
        }
        for name in &order {
            for dep in &by_name[name].dependencies {
                pg.add_edge(indices[name.as_str()], indices[dep.as_str()], ());
            }
        }
        if let Err(cycle) = toposort(&pg, None) {
            let on_cycle = pg[cycle.node_id()].to_string();
            return Err(KilnError::DependencyCycle(on_cycle));
        }

        Ok(Self {
            projects: by_name,
            dependents,
            order,
        })
    }

    /// Look up a project by name.
    pub fn project(&self, name: &str) -> Option<&Project> {
        self.projects.get(name)
    }

    /// All projects, in insertion order.
    pub fn projects(&self) -> impl Iterator<Item = &Project> {
        self.order.iter().filter_map(|n| self.projects.get(n))
    }

    /// Number of projects in the graph.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Direct dependencies of a project, in configured order.
    pub fn dependencies_of(&self, name: &str) -> &[ProjectName] {
        self.projects
            .get(name)
            .map(|p| p.dependencies.as_slice())
            .unwrap_or(&[])
    }

    /// Direct dependents of a project (projects that list it as a dependency).
    pub fn dependents_of(&self, name: &str) -> &[ProjectName] {
        self.dependents
            .get(name)
            .map(|d| d.as_slice())
            .unwrap_or(&[])
    }

    /// Dependency-closure order for `target`: every project appears after all
    /// of its dependencies, ties broken by configured dependency order.
    ///
    /// This is the processing order for one build run.
    pub fn topo_order(&self, target: &str) -> Result<Vec<ProjectName>> {
        if !self.projects.contains_key(target) {
            return Err(KilnError::ProjectNotFound(target.to_string()));
        }

        let mut out = Vec::new();
        let mut visited: HashSet<&str> = HashSet::new();
        self.visit_post_order(target, &mut visited, &mut out);
        Ok(out)
    }

    fn visit_post_order<'a>(
        &'a self,
        name: &'a str,
        visited: &mut HashSet<&'a str>,
        out: &mut Vec<ProjectName>,
    ) {
        if !visited.insert(name) {
            return;
        }
        if let Some(project) = self.projects.get(name) {
            for dep in &project.dependencies {
                self.visit_post_order(dep, visited, out);
            }
            out.push(project.name.clone());
        }
    }

    /// The subgraph reachable from `target` via dependency edges
    /// (target plus its transitive dependencies).
    pub fn subgraph(&self, target: &str) -> Result<BuildGraph> {
        let reachable = self.topo_order(target)?;
        let projects = reachable
            .iter()
            .filter_map(|n| self.projects.get(n).cloned())
            .collect();
        // Reachability preserves acyclicity and closure, so this cannot fail.
        BuildGraph::new(projects)
    }

    /// Union of source roots over the subgraph reachable from `target`,
    /// deduplicated, in dependency order. This is the watch scope for a
    /// watch session on `target`.
    pub fn source_roots(&self, target: &str) -> Result<Vec<PathBuf>> {
        let order = self.topo_order(target)?;
        let mut seen: HashSet<PathBuf> = HashSet::new();
        let mut roots = Vec::new();
        for name in order {
            if let Some(project) = self.projects.get(&name) {
                for source in &project.sources {
                    if seen.insert(source.clone()) {
                        roots.push(source.clone());
                    }
                }
            }
        }
        Ok(roots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(name: &str, deps: &[&str]) -> Project {
        Project {
            name: name.to_string(),
            sources: vec![PathBuf::from(format!("{name}/src"))],
            classpath: Vec::new(),
            dependencies: deps.iter().map(|d| d.to_string()).collect(),
            out_dir: PathBuf::from(format!("{name}/out")),
        }
    }

    #[test]
    fn diamond_topo_order_puts_deps_first() {
        let graph = BuildGraph::new(vec![
            project("a", &[]),
            project("b", &["a"]),
            project("c", &["a"]),
            project("d", &["b", "c"]),
        ])
        .unwrap();

        let order = graph.topo_order("d").unwrap();
        assert_eq!(order, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn cycle_is_rejected_at_construction() {
        let err = BuildGraph::new(vec![project("a", &["b"]), project("b", &["a"])]).unwrap_err();
        assert!(matches!(err, KilnError::DependencyCycle(_)));
    }

    #[test]
    fn missing_dependency_is_rejected_at_construction() {
        let err = BuildGraph::new(vec![project("a", &["ghost"])]).unwrap_err();
        match err {
            KilnError::MissingDependency {
                project, dependency, ..
            } => {
                assert_eq!(project, "a");
                assert_eq!(dependency, "ghost");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn subgraph_only_contains_reachable_projects() {
        let graph = BuildGraph::new(vec![
            project("a", &[]),
            project("b", &["a"]),
            project("unrelated", &[]),
        ])
        .unwrap();

        let sub = graph.subgraph("b").unwrap();
        assert_eq!(sub.len(), 2);
        assert!(sub.project("unrelated").is_none());
    }

    #[test]
    fn source_roots_are_deduplicated_in_dependency_order() {
        let mut shared = project("b", &["a"]);
        shared.sources = vec![PathBuf::from("a/src")];
        let graph = BuildGraph::new(vec![project("a", &[]), shared]).unwrap();

        let roots = graph.source_roots("b").unwrap();
        assert_eq!(roots, vec![PathBuf::from("a/src")]);
    }
}
