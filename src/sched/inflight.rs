// src/sched/inflight.rs

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tracing::debug;

use crate::cache::CompileResult;
use crate::graph::ProjectName;

type Slot = watch::Receiver<Option<Arc<CompileResult>>>;
type SharedMap = Arc<Mutex<HashMap<ProjectName, Slot>>>;

/// Map from project identity to a shared, awaitable compilation handle.
///
/// The first requester for a project becomes the leader and compiles; later
/// requesters become followers and await the leader's published result. The
/// leader's guard removes the map entry on drop, so a leader that is
/// cancelled before publishing never wedges its followers; they observe the
/// closed channel and re-join.
#[derive(Debug, Clone, Default)]
pub struct InflightMap {
    inner: SharedMap,
}

/// Outcome of joining the map for a project.
#[derive(Debug)]
pub enum Flight {
    /// This requester runs the compilation and must call
    /// [`FlightGuard::complete`].
    Leader(FlightGuard),
    /// Another requester is compiling; await its result.
    Follower(Slot),
}

impl InflightMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn join(&self, project: &str) -> Flight {
        let mut map = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(rx) = map.get(project) {
            debug!(project = %project, "joining in-flight compilation as follower");
            return Flight::Follower(rx.clone());
        }

        let (tx, rx) = watch::channel(None);
        map.insert(project.to_string(), rx);
        Flight::Leader(FlightGuard {
            project: project.to_string(),
            tx,
            map: Arc::clone(&self.inner),
        })
    }
}

/// Held by the single leader for a project while its compilation runs.
#[derive(Debug)]
pub struct FlightGuard {
    project: ProjectName,
    tx: watch::Sender<Option<Arc<CompileResult>>>,
    map: SharedMap,
}

impl FlightGuard {
    /// Publish the result to all followers and release the entry.
    pub fn complete(self, result: Arc<CompileResult>) {
        let _ = self.tx.send(Some(result));
        // Drop runs next and removes the map entry.
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        let mut map = match self.map.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        map.remove(&self.project);
    }
}

/// Await the leader's result on a follower slot.
///
/// Returns `None` when the leader went away without publishing (for example
/// it was cancelled); the caller should re-join and take over.
pub async fn await_leader(mut slot: Slot) -> Option<Arc<CompileResult>> {
    match slot.wait_for(|value| value.is_some()).await {
        Ok(guard) => guard.clone(),
        Err(_closed) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CompileStatus;

    fn dummy_result(project: &str) -> Arc<CompileResult> {
        Arc::new(CompileResult {
            project: project.to_string(),
            status: CompileStatus::Success,
            artifacts: Vec::new(),
            diagnostics: Vec::new(),
            cache_key: None,
        })
    }

    #[tokio::test]
    async fn follower_receives_leader_result() {
        let map = InflightMap::new();

        let leader = match map.join("a") {
            Flight::Leader(guard) => guard,
            Flight::Follower(_) => panic!("first join must lead"),
        };
        let follower = match map.join("a") {
            Flight::Follower(slot) => slot,
            Flight::Leader(_) => panic!("second join must follow"),
        };

        leader.complete(dummy_result("a"));
        let result = await_leader(follower).await.expect("leader published");
        assert_eq!(result.project, "a");
    }

    #[tokio::test]
    async fn dropped_leader_unblocks_followers_for_retry() {
        let map = InflightMap::new();

        let leader = match map.join("a") {
            Flight::Leader(guard) => guard,
            Flight::Follower(_) => panic!("first join must lead"),
        };
        let follower = match map.join("a") {
            Flight::Follower(slot) => slot,
            Flight::Leader(_) => panic!("second join must follow"),
        };

        drop(leader);
        assert!(await_leader(follower).await.is_none());

        // Entry released; the next join leads again.
        assert!(matches!(map.join("a"), Flight::Leader(_)));
    }
}
