// src/cache/mod.rs

//! Results cache and build-state snapshots.
//!
//! - [`results`] is the process-wide mapping from project to its last
//!   successful and last attempted compilation result, versioned by a
//!   generation counter and mutated only via copy-on-write publishes.
//! - [`state`] holds the immutable per-run [`BuildState`] snapshot and the
//!   monotonic "latest globally saved state" handle.

pub mod results;
pub mod state;

pub use results::{CacheEntry, CompileResult, CompileStatus, ResultsCache, ResultsSnapshot};
pub use state::{BuildState, GlobalState};
