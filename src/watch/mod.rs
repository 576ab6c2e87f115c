// src/watch/mod.rs

//! File watching and rebuild triggering.
//!
//! - [`watcher`] adapts the `notify` backend into the crate's event shape;
//!   the decision logic does not own the watching mechanism and any event
//!   source can drive it.
//! - [`debounce`] is the pure state machine that batches event bursts into
//!   discrete build iterations and suppresses zero-size write noise.
//! - [`session`] is the async loop tying an event stream, the debouncer, and
//!   the scheduler together for one cancellable watch session.

pub mod debounce;
pub mod session;
pub mod watcher;

pub use debounce::{DebounceState, Debouncer};
pub use session::BuildHandle;
pub use watcher::{WatcherHandle, spawn_watcher};

use std::path::PathBuf;

/// Kind of filesystem change reported by the notification source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Created,
    Modified,
    Deleted,
}

/// One filesystem change notification.
///
/// `size_hint` is the file size observed at notification time, when the
/// source can provide it; the debouncer uses it to hold back the transient
/// zero-size writes some editors and remote filesystems produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    pub path: PathBuf,
    pub kind: EventKind,
    pub size_hint: Option<u64>,
}
