// src/lib.rs

//! Incremental build orchestration core for a persistent compile server.
//!
//! Given a validated [`BuildGraph`] and an external [`Compiler`]
//! collaborator, a [`BuildServer`]:
//! - decides which projects are stale via content-addressed cache keys
//!   (source fingerprint + classpath digest),
//! - runs compilations in dependency order with single-flight deduplication,
//! - caches the last successful result per project behind copy-on-write
//!   publishes,
//! - and, in watch mode, keeps rebuilding once per debounced burst of
//!   filesystem changes until cancelled.

pub mod cache;
pub mod compiler;
pub mod errors;
pub mod graph;
pub mod hash;
pub mod logging;
pub mod sched;
pub mod types;
pub mod watch;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::cache::{BuildState, CompileResult, GlobalState, ResultsCache};
use crate::compiler::Compiler;
use crate::errors::{KilnError, Result};
use crate::graph::BuildGraph;
use crate::hash::ClasspathHasher;
use crate::sched::Scheduler;
use crate::types::{ExitStatus, HashSettings, WatchSettings};
use crate::watch::session::{BuildHandle, watch_loop};
use crate::watch::{FileEvent, spawn_watcher};

/// The externally observable surface of the core.
///
/// Owns the graph, the results cache, the hasher, and the latest-state
/// handle; the compiler is injected. Clone-cheap: all state is behind `Arc`s,
/// and the results cache is the only shared mutable resource.
#[derive(Debug, Clone)]
pub struct BuildServer {
    graph: Arc<BuildGraph>,
    cache: Arc<ResultsCache>,
    global: Arc<GlobalState>,
    scheduler: Arc<Scheduler>,
    watch_settings: WatchSettings,
}

impl BuildServer {
    pub fn new(graph: BuildGraph, compiler: Arc<dyn Compiler>) -> Self {
        Self::with_settings(
            graph,
            compiler,
            WatchSettings::default(),
            HashSettings::default(),
        )
    }

    pub fn with_settings(
        graph: BuildGraph,
        compiler: Arc<dyn Compiler>,
        watch_settings: WatchSettings,
        hash_settings: HashSettings,
    ) -> Self {
        let graph = Arc::new(graph);
        let cache = Arc::new(ResultsCache::new());
        let global = Arc::new(GlobalState::new());
        let hasher = Arc::new(ClasspathHasher::new());
        let scheduler = Arc::new(Scheduler::new(
            Arc::clone(&graph),
            Arc::clone(&cache),
            hasher,
            compiler,
            Arc::clone(&global),
            hash_settings,
        ));
        Self {
            graph,
            cache,
            global,
            scheduler,
            watch_settings,
        }
    }

    /// Synchronous single build of `target` and its dependency closure.
    pub async fn compile(&self, target: &str) -> Result<Arc<BuildState>> {
        self.scheduler
            .run_build(target, &CancellationToken::new())
            .await
    }

    /// Start a cancellable build. With `watch = true` the session keeps
    /// rebuilding on debounced filesystem changes (scoped to the source roots
    /// of `target`'s dependency closure) until cancelled.
    pub fn compile_handle(&self, target: &str, watch: bool) -> Result<BuildHandle> {
        if !watch {
            return self.spawn_single(target);
        }

        let roots = self.graph.source_roots(target)?;
        let (event_tx, event_rx) = mpsc::unbounded_channel::<FileEvent>();
        let watcher = spawn_watcher(&roots, event_tx)?;
        self.spawn_watch(target, roots, event_rx, Some(watcher))
    }

    /// Watch-mode session over a caller-supplied notification stream.
    ///
    /// The core only specifies the debounce/decision logic atop whatever
    /// notification source is supplied; this is the seam for alternative
    /// backends (and for tests).
    pub fn watch_with_source(
        &self,
        target: &str,
        event_rx: mpsc::UnboundedReceiver<FileEvent>,
    ) -> Result<BuildHandle> {
        let roots = self.graph.source_roots(target)?;
        self.spawn_watch(target, roots, event_rx, None)
    }

    /// Most recently published build state across all sessions, if any build
    /// has completed yet.
    pub fn latest_saved_state(&self) -> Option<Arc<BuildState>> {
        self.global.latest()
    }

    /// The dependency-closure subgraph for `target`.
    pub fn dag_for(&self, target: &str) -> Result<BuildGraph> {
        self.graph.subgraph(target)
    }

    /// Last successful compilation result for `target`, if any.
    pub fn last_successful_result_for(&self, target: &str) -> Option<Arc<CompileResult>> {
        self.cache.last_successful(target)
    }

    /// Subscribe to build state publishes (observer API).
    pub fn subscribe(&self) -> tokio::sync::watch::Receiver<Option<Arc<BuildState>>> {
        self.global.subscribe()
    }

    fn spawn_single(&self, target: &str) -> Result<BuildHandle> {
        self.require_project(target)?;
        let token = CancellationToken::new();
        let iterations = Arc::new(AtomicU64::new(0));

        let scheduler = Arc::clone(&self.scheduler);
        let target = target.to_string();
        let task_token = token.clone();
        let join = tokio::spawn(async move {
            let state = scheduler.run_build(&target, &task_token).await?;
            Ok(state.status())
        });

        Ok(BuildHandle::new(token, iterations, join))
    }

    fn spawn_watch(
        &self,
        target: &str,
        roots: Vec<PathBuf>,
        event_rx: mpsc::UnboundedReceiver<FileEvent>,
        watcher: Option<watch::WatcherHandle>,
    ) -> Result<BuildHandle> {
        self.require_project(target)?;
        let token = CancellationToken::new();
        let iterations = Arc::new(AtomicU64::new(0));

        let scheduler = Arc::clone(&self.scheduler);
        let settings = self.watch_settings;
        let target = target.to_string();
        let task_token = token.clone();
        let task_iterations = Arc::clone(&iterations);

        let join = tokio::spawn(async move {
            // Keep the notification subscription alive for the whole session;
            // dropping it on exit releases the backend watcher.
            let _watcher = watcher;

            // Initial build runs once before the session goes Idle.
            let initial = scheduler.run_build(&target, &task_token).await?;
            if initial.status() == ExitStatus::Cancelled {
                return Ok(ExitStatus::Cancelled);
            }

            watch_loop(
                scheduler,
                target,
                settings,
                roots,
                event_rx,
                task_token,
                task_iterations,
            )
            .await
        });

        Ok(BuildHandle::new(token, iterations, join))
    }

    fn require_project(&self, target: &str) -> Result<()> {
        if self.graph.project(target).is_none() {
            return Err(KilnError::ProjectNotFound(target.to_string()));
        }
        Ok(())
    }
}
