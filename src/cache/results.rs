// src/cache/results.rs

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::graph::ProjectName;
use crate::hash::CacheKey;

/// Outcome of compiling one project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileStatus {
    Success,
    Failure,
    Cancelled,
}

/// Result of one compilation attempt for one project, as stored in the cache
/// and surfaced through [`super::BuildState`].
///
/// Equality of two results retrieved across different build states is defined
/// by cache-key equality, not object identity; see [`CompileResult::same_result`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileResult {
    pub project: ProjectName,
    pub status: CompileStatus,
    pub artifacts: Vec<PathBuf>,
    pub diagnostics: Vec<String>,
    /// The cache key the scheduler computed for this attempt. Always present
    /// for results that went through key computation; absent only for
    /// results propagated from an upstream failure before a key existed.
    pub cache_key: Option<CacheKey>,
}

impl CompileResult {
    pub fn is_success(&self) -> bool {
        self.status == CompileStatus::Success
    }

    /// Value equality for "the result did not change" assertions: both
    /// results carry a key and the keys are equal.
    pub fn same_result(&self, other: &CompileResult) -> bool {
        match (&self.cache_key, &other.cache_key) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

/// Per-project retention: exactly the latest successful result and the latest
/// attempt, nothing more.
#[derive(Debug, Clone, Default)]
pub struct CacheEntry {
    latest_successful: Option<Arc<CompileResult>>,
    latest_attempt: Option<Arc<CompileResult>>,
}

impl CacheEntry {
    pub fn latest_successful(&self) -> Option<&Arc<CompileResult>> {
        self.latest_successful.as_ref()
    }

    pub fn latest_attempt(&self) -> Option<&Arc<CompileResult>> {
        self.latest_attempt.as_ref()
    }
}

/// Immutable point-in-time view over the cache, shared by readers.
pub type ResultsSnapshot = Arc<HashMap<ProjectName, CacheEntry>>;

/// Process-wide mapping from project to its last compilation results.
///
/// All mutation is copy-on-write: `publish` clones the map, replaces the
/// entry, and swaps the shared `Arc`, so readers holding a snapshot never
/// observe a half-written result and never need a lock to read.
#[derive(Debug, Default)]
pub struct ResultsCache {
    inner: Mutex<ResultsSnapshot>,
    /// Bumped on each successful publish; reads are wait-free.
    generation: AtomicU64,
}

impl ResultsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest attempted result for a project, successful or not.
    pub fn get(&self, project: &str) -> Option<Arc<CompileResult>> {
        self.snapshot()
            .get(project)
            .and_then(|e| e.latest_attempt.clone())
    }

    /// Latest successful result for a project.
    pub fn last_successful(&self, project: &str) -> Option<Arc<CompileResult>> {
        self.snapshot()
            .get(project)
            .and_then(|e| e.latest_successful.clone())
    }

    /// Atomically publish a new result, returning the generation after the
    /// publish. The generation only advances on successful results.
    pub fn publish(&self, result: Arc<CompileResult>) -> u64 {
        let mut guard = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let mut map: HashMap<ProjectName, CacheEntry> = (**guard).clone();
        let entry = map.entry(result.project.clone()).or_default();
        entry.latest_attempt = Some(Arc::clone(&result));
        let generation = if result.is_success() {
            entry.latest_successful = Some(Arc::clone(&result));
            self.generation.fetch_add(1, Ordering::SeqCst) + 1
        } else {
            self.generation.load(Ordering::SeqCst)
        };
        *guard = Arc::new(map);

        debug!(
            project = %result.project,
            status = ?result.status,
            generation,
            "published compile result"
        );
        generation
    }

    /// Current generation (advanced once per successful publish).
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Wait-free snapshot for readers.
    pub fn snapshot(&self) -> ResultsSnapshot {
        match self.inner.lock() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::Digest;

    fn result(project: &str, status: CompileStatus) -> Arc<CompileResult> {
        Arc::new(CompileResult {
            project: project.to_string(),
            status,
            artifacts: Vec::new(),
            diagnostics: Vec::new(),
            cache_key: Some(CacheKey {
                sources: Digest::cancelled(),
                classpath: Digest::cancelled(),
            }),
        })
    }

    #[test]
    fn generation_advances_only_on_success() {
        let cache = ResultsCache::new();
        assert_eq!(cache.generation(), 0);

        cache.publish(result("a", CompileStatus::Failure));
        assert_eq!(cache.generation(), 0);

        cache.publish(result("a", CompileStatus::Success));
        assert_eq!(cache.generation(), 1);
    }

    #[test]
    fn failed_attempt_does_not_clobber_last_successful() {
        let cache = ResultsCache::new();
        cache.publish(result("a", CompileStatus::Success));
        cache.publish(result("a", CompileStatus::Failure));

        assert_eq!(
            cache.last_successful("a").unwrap().status,
            CompileStatus::Success
        );
        assert_eq!(cache.get("a").unwrap().status, CompileStatus::Failure);
    }

    #[test]
    fn snapshot_is_isolated_from_later_publishes() {
        let cache = ResultsCache::new();
        cache.publish(result("a", CompileStatus::Success));
        let snapshot = cache.snapshot();

        cache.publish(result("b", CompileStatus::Success));
        assert!(snapshot.get("b").is_none());
        assert!(cache.snapshot().get("b").is_some());
    }
}
