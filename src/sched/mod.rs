// src/sched/mod.rs

//! Build scheduling.
//!
//! - [`scheduler`] walks the dependency-closure of a target in topological
//!   order, reuses cached results on key equality, and propagates failures
//!   to dependents without invoking the compiler.
//! - [`inflight`] is the explicit single-flight map: concurrent requests for
//!   the same project attach to one shared awaitable handle instead of
//!   re-triggering the work.

pub mod inflight;
pub mod scheduler;

pub use inflight::InflightMap;
pub use scheduler::Scheduler;
