// src/watch/debounce.rs

//! Pure debounce state machine.
//!
//! The machine is synchronous and deterministic: it consumes timestamped
//! events and deadline ticks and reports when a build iteration should fire.
//! The async shell ([`super::session`]) owns the clock and the scheduler;
//! this module is unit tested without any runtime.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Instant;

use tracing::{debug, trace};

use crate::types::WatchSettings;
use crate::watch::{EventKind, FileEvent};

/// Session states. `Idle → Buffering → Triggering → Idle` loops;
/// `Cancelled` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceState {
    Idle,
    Buffering,
    Triggering,
    Cancelled,
}

/// Batches bursts of filesystem events into discrete build iterations.
#[derive(Debug)]
pub struct Debouncer {
    settings: WatchSettings,
    state: DebounceState,
    /// Actionable events absorbed into the current window.
    pending: usize,
    /// When the current buffering window elapses.
    window_deadline: Option<Instant>,
    /// Zero-size modifications held back per path, with their discard
    /// deadline. A held event alone never triggers a rebuild.
    held_zero: HashMap<PathBuf, Instant>,
}

impl Debouncer {
    pub fn new(settings: WatchSettings) -> Self {
        Self {
            settings,
            state: DebounceState::Idle,
            pending: 0,
            window_deadline: None,
            held_zero: HashMap::new(),
        }
    }

    pub fn state(&self) -> DebounceState {
        self.state
    }

    /// Earliest instant at which [`Debouncer::on_deadline`] should be called,
    /// if any deadline is armed.
    pub fn next_deadline(&self) -> Option<Instant> {
        let held = self.held_zero.values().min().copied();
        match (self.window_deadline, held) {
            (Some(w), Some(h)) => Some(w.min(h)),
            (Some(w), None) => Some(w),
            (None, h) => h,
        }
    }

    /// Feed one in-scope event into the machine.
    pub fn on_event(&mut self, event: &FileEvent, now: Instant) {
        if self.state == DebounceState::Cancelled {
            return;
        }

        // A zero-size modification is a transient artifact of two-step file
        // writes; hold it back until a real write supersedes it.
        if event.kind == EventKind::Modified && event.size_hint == Some(0) {
            trace!(path = ?event.path, "holding back zero-size modification");
            self.held_zero
                .insert(event.path.clone(), now + self.settings.zero_size_grace);
            return;
        }

        // A non-trivial event supersedes any held zero-size write on the same
        // path; the pair counts as one logical edit.
        self.held_zero.remove(&event.path);

        self.pending += 1;
        if self.state == DebounceState::Idle {
            debug!(path = ?event.path, "first actionable event; buffering");
            self.state = DebounceState::Buffering;
        }
        // Later events extend the window instead of firing separately.
        self.window_deadline = Some(now + self.settings.debounce_window);
    }

    /// Advance the machine on a deadline tick. Returns `true` when a build
    /// iteration should fire now; the driver must call
    /// [`Debouncer::iteration_finished`] afterwards.
    pub fn on_deadline(&mut self, now: Instant) -> bool {
        if self.state == DebounceState::Cancelled {
            return false;
        }

        // Held zero-size writes whose grace elapsed without a follow-up are
        // spurious; drop them silently.
        self.held_zero.retain(|path, deadline| {
            let keep = *deadline > now;
            if !keep {
                trace!(?path, "discarding zero-size modification without follow-up");
            }
            keep
        });

        match self.window_deadline {
            Some(deadline) if deadline <= now => {
                self.window_deadline = None;
                let fire = self.pending > 0;
                self.pending = 0;
                if fire {
                    self.state = DebounceState::Triggering;
                } else {
                    self.state = DebounceState::Idle;
                }
                fire
            }
            _ => false,
        }
    }

    /// One iteration completed; return to `Idle` (unless cancelled mid-run).
    pub fn iteration_finished(&mut self) {
        if self.state == DebounceState::Triggering {
            self.state = DebounceState::Idle;
        }
    }

    /// Terminal transition; all buffered state is dropped.
    pub fn cancel(&mut self) {
        self.state = DebounceState::Cancelled;
        self.pending = 0;
        self.window_deadline = None;
        self.held_zero.clear();
    }
}
