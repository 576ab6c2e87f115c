// src/types.rs

use std::time::Duration;

use serde::Deserialize;

/// Overall outcome of one build run (initial compile or one watch iteration).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Ok,
    CompilationError,
    Cancelled,
}

impl ExitStatus {
    /// Process exit code for the surrounding CLI layer.
    pub fn exit_code(self) -> i32 {
        match self {
            ExitStatus::Ok => 0,
            ExitStatus::CompilationError => 1,
            ExitStatus::Cancelled => 130,
        }
    }
}

/// Marker for a cancelled long-running operation (hash call, build run).
///
/// Cancellation is a typed outcome, never conflated with failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

impl std::fmt::Display for Cancelled {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("operation cancelled")
    }
}

/// Tunables for the watch/debounce loop.
///
/// The exact durations are empirically tuned; they are configuration, not
/// invariants, so constructors take them instead of hard-coding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WatchSettings {
    /// How long to keep absorbing filesystem events into one pending trigger
    /// before firing a build iteration.
    pub debounce_window: Duration,
    /// How long a zero-size modification is held back waiting for the
    /// follow-up write before it is discarded.
    pub zero_size_grace: Duration,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            debounce_window: Duration::from_millis(300),
            zero_size_grace: Duration::from_millis(500),
        }
    }
}

/// Tunables for classpath hashing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HashSettings {
    /// Upper bound on concurrently hashed classpath entries per `hash` call.
    pub parallelism: usize,
}

impl Default for HashSettings {
    fn default() -> Self {
        let parallelism = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self { parallelism }
    }
}
