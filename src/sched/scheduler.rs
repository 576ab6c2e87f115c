// src/sched/scheduler.rs

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::{BuildState, CompileResult, CompileStatus, GlobalState, ResultsCache};
use crate::compiler::{Compiler, resolve_classpath};
use crate::errors::{KilnError, Result};
use crate::graph::{BuildGraph, Project, ProjectName};
use crate::hash::{CacheKey, ClasspathHasher};
use crate::sched::inflight::{self, Flight, InflightMap};
use crate::types::{Cancelled, ExitStatus, HashSettings};

/// Walks the build graph for a target and executes only the stale subset in
/// dependency order.
///
/// Holds the immutable graph plus shared references to the results cache,
/// the hasher, and the injected compiler collaborator. Concurrent `run_build`
/// calls over overlapping subgraphs deduplicate per-project compilations
/// through the single-flight map.
pub struct Scheduler {
    graph: Arc<BuildGraph>,
    cache: Arc<ResultsCache>,
    hasher: Arc<ClasspathHasher>,
    compiler: Arc<dyn Compiler>,
    global: Arc<GlobalState>,
    inflight: InflightMap,
    hash_settings: HashSettings,
    /// Monotonically increasing run ID, for log correlation only.
    run_counter: AtomicU64,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("graph", &self.graph)
            .field("hash_settings", &self.hash_settings)
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    pub fn new(
        graph: Arc<BuildGraph>,
        cache: Arc<ResultsCache>,
        hasher: Arc<ClasspathHasher>,
        compiler: Arc<dyn Compiler>,
        global: Arc<GlobalState>,
        hash_settings: HashSettings,
    ) -> Self {
        Self {
            graph,
            cache,
            hasher,
            compiler,
            global,
            inflight: InflightMap::new(),
            hash_settings,
            run_counter: AtomicU64::new(0),
        }
    }

    pub fn graph(&self) -> &Arc<BuildGraph> {
        &self.graph
    }

    /// Run one build for `target`: hash, compare against the cache, compile
    /// the stale subset, and publish the resulting [`BuildState`] as the
    /// latest globally saved state.
    ///
    /// Node-level compilation failures are recovered locally: dependents are
    /// marked failed without invoking the compiler and the run completes with
    /// a `CompilationError` status instead of an error.
    pub async fn run_build(
        &self,
        target: &str,
        token: &CancellationToken,
    ) -> Result<Arc<BuildState>> {
        let run_id = self.run_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let order = self.graph.topo_order(target)?;
        info!(run_id, project = %target, projects = order.len(), "starting build run");

        let mut run_results: HashMap<ProjectName, Arc<CompileResult>> = HashMap::new();
        let mut overall = ExitStatus::Ok;

        for name in &order {
            let Some(project) = self.graph.project(name) else {
                warn!(project = %name, "project from topological order missing in graph; skipping");
                continue;
            };

            if token.is_cancelled() {
                let result = self.record_skipped(name, CompileStatus::Cancelled, Vec::new());
                run_results.insert(name.clone(), result);
                if overall == ExitStatus::Ok {
                    overall = ExitStatus::Cancelled;
                }
                continue;
            }

            // Upstream failure propagation: never invoke the compiler for a
            // project whose dependency did not produce output this run.
            let bad_dep = project
                .dependencies
                .iter()
                .find_map(|dep| run_results.get(dep).filter(|r| !r.is_success()).cloned());
            if let Some(bad) = bad_dep {
                let status = match bad.status {
                    CompileStatus::Cancelled => CompileStatus::Cancelled,
                    _ => CompileStatus::Failure,
                };
                debug!(
                    project = %name,
                    upstream = %bad.project,
                    ?status,
                    "marking project without compiling due to upstream outcome"
                );
                let diagnostics = vec![format!("dependency '{}' did not compile", bad.project)];
                let result = self.record_skipped(name, status, diagnostics);
                run_results.insert(name.clone(), result);
                continue;
            }

            let dep_dirs: Vec<&Path> = project
                .dependencies
                .iter()
                .filter_map(|dep| self.graph.project(dep))
                .map(|p| p.out_dir.as_path())
                .collect();
            let classpath = resolve_classpath(project, &dep_dirs);

            let sources = match self.fingerprint_sources(project).await? {
                Ok(digest) => digest,
                Err(err) => {
                    warn!(project = %name, error = %err, "failed to fingerprint sources");
                    let diagnostics = vec![format!("failed to fingerprint sources: {err}")];
                    let result = self.record_skipped(name, CompileStatus::Failure, diagnostics);
                    run_results.insert(name.clone(), result);
                    if overall == ExitStatus::Ok {
                        overall = ExitStatus::CompilationError;
                    }
                    continue;
                }
            };

            let key = match self
                .hasher
                .hash(&classpath, self.hash_settings.parallelism, token)
                .await
            {
                Ok(digests) => ClasspathHasher::cache_key(sources, &digests),
                Err(Cancelled) => {
                    debug!(project = %name, run_id, "classpath hashing cancelled");
                    let result = self.record_skipped(name, CompileStatus::Cancelled, Vec::new());
                    run_results.insert(name.clone(), result);
                    if overall == ExitStatus::Ok {
                        overall = ExitStatus::Cancelled;
                    }
                    continue;
                }
            };

            if let Some(previous) = self.cache.last_successful(name) {
                if previous.cache_key.as_ref() == Some(&key) {
                    debug!(project = %name, run_id, "cache hit; reusing last successful result");
                    // Re-publish only when a later failed attempt shadows the
                    // reusable success, so the snapshot reflects this run.
                    let shadowed = self
                        .cache
                        .get(name)
                        .map(|latest| !Arc::ptr_eq(&latest, &previous))
                        .unwrap_or(true);
                    if shadowed {
                        self.cache.publish(Arc::clone(&previous));
                    }
                    run_results.insert(name.clone(), previous);
                    continue;
                }
            }

            let result = self
                .compile_single_flight(project, &classpath, key, token, run_id)
                .await;
            self.cache.publish(Arc::clone(&result));
            if overall == ExitStatus::Ok {
                overall = match result.status {
                    CompileStatus::Success => ExitStatus::Ok,
                    CompileStatus::Failure => ExitStatus::CompilationError,
                    CompileStatus::Cancelled => ExitStatus::Cancelled,
                };
            }
            run_results.insert(name.clone(), result);
        }

        let state = Arc::new(BuildState::new(
            Arc::clone(&self.graph),
            self.cache.snapshot(),
            overall,
            self.cache.generation(),
        ));
        self.global.publish(Arc::clone(&state));
        info!(
            run_id,
            status = ?overall,
            generation = state.generation(),
            "build run complete"
        );
        Ok(state)
    }

    async fn fingerprint_sources(
        &self,
        project: &Project,
    ) -> Result<anyhow::Result<crate::hash::Digest>> {
        let hasher = Arc::clone(&self.hasher);
        let project = project.clone();
        tokio::task::spawn_blocking(move || hasher.fingerprint_sources(&project))
            .await
            .map_err(|err| KilnError::Other(anyhow::Error::new(err)))
    }

    /// Record a result for a project that was not compiled this run
    /// (cancelled, or blocked by an upstream outcome).
    fn record_skipped(
        &self,
        name: &str,
        status: CompileStatus,
        diagnostics: Vec<String>,
    ) -> Arc<CompileResult> {
        let result = Arc::new(CompileResult {
            project: name.to_string(),
            status,
            artifacts: Vec::new(),
            diagnostics,
            cache_key: None,
        });
        self.cache.publish(Arc::clone(&result));
        result
    }

    /// Compile through the single-flight map: the first requester for a
    /// project leads, later requesters await the shared handle.
    async fn compile_single_flight(
        &self,
        project: &Project,
        classpath: &[PathBuf],
        key: CacheKey,
        token: &CancellationToken,
        run_id: u64,
    ) -> Arc<CompileResult> {
        loop {
            match self.inflight.join(&project.name) {
                Flight::Leader(guard) => {
                    if token.is_cancelled() {
                        let result = Arc::new(CompileResult {
                            project: project.name.clone(),
                            status: CompileStatus::Cancelled,
                            artifacts: Vec::new(),
                            diagnostics: Vec::new(),
                            cache_key: Some(key),
                        });
                        guard.complete(Arc::clone(&result));
                        return result;
                    }

                    info!(project = %project.name, run_id, "compiling");
                    let output = self.compiler.compile(project, classpath, token).await;
                    let result = Arc::new(CompileResult {
                        project: project.name.clone(),
                        status: output.status,
                        artifacts: output.artifacts,
                        diagnostics: output.diagnostics,
                        cache_key: Some(key),
                    });
                    guard.complete(Arc::clone(&result));
                    return result;
                }
                Flight::Follower(slot) => {
                    debug!(project = %project.name, run_id, "awaiting in-flight compilation");
                    match inflight::await_leader(slot).await {
                        Some(result) => return result,
                        // Leader went away without publishing; take over.
                        None => continue,
                    }
                }
            }
        }
    }
}
