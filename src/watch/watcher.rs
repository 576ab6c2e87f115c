// src/watch/watcher.rs

use std::path::{Path, PathBuf};

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::errors::{KilnError, Result};
use crate::watch::{EventKind, FileEvent};

/// Handle for the filesystem watcher.
///
/// This exists mainly so the underlying `RecommendedWatcher` is kept alive
/// for as long as needed. Dropping this handle releases the notification
/// subscription.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}

/// Spawn a filesystem watcher over the given source roots, forwarding
/// [`FileEvent`]s into `event_tx`.
///
/// The roots are watched recursively; roots that do not exist yet are
/// skipped (a project may declare source directories it has not created).
/// Backend errors after startup surface on the session as `WatcherIo` when
/// the event stream closes.
pub fn spawn_watcher(
    roots: &[PathBuf],
    event_tx: mpsc::UnboundedSender<FileEvent>,
) -> Result<WatcherHandle> {
    // Closure called synchronously by notify whenever an event arrives.
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                let Some(kind) = map_kind(&event) else {
                    return;
                };
                for path in event.paths {
                    let size_hint = match kind {
                        EventKind::Deleted => None,
                        _ => std::fs::metadata(&path).ok().map(|m| m.len()),
                    };
                    // Receiver gone means the session ended; nothing to do.
                    let _ = event_tx.send(FileEvent {
                        path,
                        kind,
                        size_hint,
                    });
                }
            }
            Err(err) => {
                warn!(error = %err, "file watch backend error");
            }
        },
        Config::default(),
    )
    .map_err(|err| KilnError::WatcherIo(err.to_string()))?;

    let mut watched = 0usize;
    for root in roots {
        if root.exists() {
            watcher
                .watch(root, RecursiveMode::Recursive)
                .map_err(|err| KilnError::WatcherIo(err.to_string()))?;
            watched += 1;
        } else {
            debug!(root = ?root, "skipping non-existent source root");
        }
    }

    info!("Watching {watched} directories");

    Ok(WatcherHandle { _inner: watcher })
}

/// Whether `path` falls under any of the watched source roots.
pub fn in_scope(roots: &[PathBuf], path: &Path) -> bool {
    roots.iter().any(|root| path.starts_with(root))
}

fn map_kind(event: &Event) -> Option<EventKind> {
    use notify::EventKind as NotifyKind;
    match event.kind {
        NotifyKind::Create(_) => Some(EventKind::Created),
        NotifyKind::Modify(_) => Some(EventKind::Modified),
        NotifyKind::Remove(_) => Some(EventKind::Deleted),
        NotifyKind::Access(_) => None,
        NotifyKind::Any | NotifyKind::Other => Some(EventKind::Modified),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_check_uses_path_prefixes() {
        let roots = vec![PathBuf::from("/ws/a/src"), PathBuf::from("/ws/b/src")];
        assert!(in_scope(&roots, Path::new("/ws/a/src/Main.scala")));
        assert!(!in_scope(&roots, Path::new("/ws/c/src/Main.scala")));
        // Prefix is per path component, not per byte.
        assert!(!in_scope(&roots, Path::new("/ws/a/srcfoo/Main.scala")));
    }
}
