// src/watch/session.rs

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::errors::{KilnError, Result};
use crate::sched::Scheduler;
use crate::types::{ExitStatus, WatchSettings};
use crate::watch::debounce::Debouncer;
use crate::watch::watcher::in_scope;
use crate::watch::FileEvent;

/// Cancellable handle for a running build (single or watch mode).
///
/// Watch mode keeps rebuilding until cancelled; the iteration counter is the
/// externally observable way to tell "one rebuild just happened" from "no
/// more rebuilds are happening".
#[derive(Debug)]
pub struct BuildHandle {
    token: CancellationToken,
    iterations: Arc<AtomicU64>,
    join: tokio::task::JoinHandle<Result<ExitStatus>>,
}

impl BuildHandle {
    pub(crate) fn new(
        token: CancellationToken,
        iterations: Arc<AtomicU64>,
        join: tokio::task::JoinHandle<Result<ExitStatus>>,
    ) -> Self {
        Self {
            token,
            iterations,
            join,
        }
    }

    /// Request cancellation; the session reports `Cancelled` rather than
    /// erroring, and releases its notification subscription.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Completed watch iterations so far (0 in single-build mode).
    pub fn iterations(&self) -> u64 {
        self.iterations.load(Ordering::SeqCst)
    }

    /// Wait for the session to finish and return its final status.
    pub async fn join(self) -> Result<ExitStatus> {
        match self.join.await {
            Ok(result) => result,
            Err(err) => Err(KilnError::Other(anyhow::Error::new(err))),
        }
    }
}

/// One watch session: consume events, debounce, rebuild once per window.
///
/// The initial build has already run by the time this loop starts; the
/// debouncer therefore begins in `Idle`. The loop ends on cancellation
/// (status `Cancelled`) or when the notification stream closes unexpectedly
/// (`WatcherIo` error).
pub(crate) async fn watch_loop(
    scheduler: Arc<Scheduler>,
    target: String,
    settings: WatchSettings,
    scope: Vec<PathBuf>,
    mut event_rx: mpsc::UnboundedReceiver<FileEvent>,
    token: CancellationToken,
    iterations: Arc<AtomicU64>,
) -> Result<ExitStatus> {
    let mut debouncer = Debouncer::new(settings);

    loop {
        let deadline = debouncer.next_deadline();
        let window_elapsed = async {
            match deadline {
                Some(at) => tokio::time::sleep_until(tokio::time::Instant::from_std(at)).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            _ = token.cancelled() => {
                debouncer.cancel();
                info!(project = %target, "watch session cancelled");
                return Ok(ExitStatus::Cancelled);
            }
            received = event_rx.recv() => match received {
                Some(event) => {
                    if in_scope(&scope, &event.path) {
                        debug!(path = ?event.path, kind = ?event.kind, "in-scope change");
                        debouncer.on_event(&event, Instant::now());
                    }
                }
                None => {
                    return Err(KilnError::WatcherIo(
                        "notification stream closed unexpectedly".to_string(),
                    ));
                }
            },
            _ = window_elapsed => {
                if debouncer.on_deadline(Instant::now()) {
                    let state = scheduler.run_build(&target, &token).await?;
                    let iteration = iterations.fetch_add(1, Ordering::SeqCst) + 1;
                    // Iteration-boundary marker; observers count these.
                    info!(
                        iteration,
                        status = ?state.status(),
                        "Watch iteration complete"
                    );
                    debouncer.iteration_finished();
                }
            }
        }
    }
}
