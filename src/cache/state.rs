// src/cache/state.rs

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use crate::cache::results::{CompileResult, ResultsSnapshot};
use crate::graph::BuildGraph;
use crate::types::ExitStatus;

/// Immutable snapshot produced by one completed build run: the graph it ran
/// over, a view of the results cache at publish time, and the overall status.
///
/// Older snapshots remain valid for callers that still hold a reference;
/// newer publishes replace the global latest, never mutate.
#[derive(Debug, Clone)]
pub struct BuildState {
    graph: Arc<BuildGraph>,
    results: ResultsSnapshot,
    status: ExitStatus,
    generation: u64,
}

impl BuildState {
    pub fn new(
        graph: Arc<BuildGraph>,
        results: ResultsSnapshot,
        status: ExitStatus,
        generation: u64,
    ) -> Self {
        Self {
            graph,
            results,
            status,
            generation,
        }
    }

    pub fn graph(&self) -> &Arc<BuildGraph> {
        &self.graph
    }

    pub fn status(&self) -> ExitStatus {
        self.status
    }

    /// Cache generation at the moment this state was assembled.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Latest attempted result for a project, as of this snapshot.
    pub fn result_for(&self, project: &str) -> Option<&Arc<CompileResult>> {
        self.results.get(project).and_then(|e| e.latest_attempt())
    }

    /// Latest successful result for a project, as of this snapshot.
    pub fn last_successful_for(&self, project: &str) -> Option<&Arc<CompileResult>> {
        self.results
            .get(project)
            .and_then(|e| e.latest_successful())
    }
}

/// The "latest globally saved state" handle.
///
/// Publishes are totally ordered and monotonic in generation: a snapshot
/// with an older generation never replaces a newer one, so observers can
/// never see the sequence go backward. Reads never block writers.
#[derive(Debug)]
pub struct GlobalState {
    tx: watch::Sender<Option<Arc<BuildState>>>,
}

impl Default for GlobalState {
    fn default() -> Self {
        Self::new()
    }
}

impl GlobalState {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Publish a new state unless a newer generation is already current.
    pub fn publish(&self, state: Arc<BuildState>) {
        self.tx.send_if_modified(|current| {
            let newer = match current {
                Some(existing) => state.generation() >= existing.generation(),
                None => true,
            };
            if newer {
                debug!(
                    generation = state.generation(),
                    status = ?state.status(),
                    "publishing latest build state"
                );
                *current = Some(state.clone());
            }
            newer
        });
    }

    /// Most recently published state, if any build has completed yet.
    pub fn latest(&self) -> Option<Arc<BuildState>> {
        self.tx.borrow().clone()
    }

    /// Subscribe to state publishes (used by observers and tests).
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<BuildState>>> {
        self.tx.subscribe()
    }
}
