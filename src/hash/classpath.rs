// src/hash/classpath.rs

use std::path::PathBuf;
use std::sync::Arc;

use blake3::Hasher;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::graph::Project;
use crate::hash::content::ContentHasher;
use crate::hash::{CacheKey, Digest, EntryDigest};
use crate::types::Cancelled;

/// Fans [`ContentHasher`] calls out over a list of classpath entries with
/// bounded parallelism.
///
/// Each `hash` invocation carries its own cancellation token; cancelling one
/// in-flight call leaves any concurrent call over the same entries untouched.
/// Workers share only the content memo, which cancellation never writes to.
#[derive(Debug, Default)]
pub struct ClasspathHasher {
    content: Arc<ContentHasher>,
}

impl ClasspathHasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Digest every entry, returning results in input order regardless of
    /// completion order.
    ///
    /// On cancellation the result is `Err(Cancelled)`; the cancellation
    /// sentinel digest never appears in an `Ok`. Unreadable entries degrade
    /// to a marker digest with a warning rather than failing the whole call.
    pub async fn hash(
        &self,
        entries: &[PathBuf],
        parallelism: usize,
        token: &CancellationToken,
    ) -> Result<Vec<EntryDigest>, Cancelled> {
        if token.is_cancelled() {
            return Err(Cancelled);
        }

        let semaphore = Arc::new(Semaphore::new(parallelism.max(1)));
        let mut join_set: JoinSet<(usize, Digest)> = JoinSet::new();

        for (idx, path) in entries.iter().cloned().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let content = Arc::clone(&self.content);
            let token = token.clone();

            join_set.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return (idx, Digest::cancelled()),
                };
                // Queued work that only gets its permit after cancellation
                // never starts hashing.
                if token.is_cancelled() {
                    return (idx, Digest::cancelled());
                }

                let hash_path = path.clone();
                let blocking =
                    tokio::task::spawn_blocking(move || content.hash_entry(&hash_path));

                tokio::select! {
                    _ = token.cancelled() => (idx, Digest::cancelled()),
                    joined = blocking => match joined {
                        Ok(Ok(digest)) => (idx, digest),
                        Ok(Err(err)) => {
                            warn!(path = ?path, error = %err, "failed to hash classpath entry; using marker digest");
                            let mut hasher = Hasher::new();
                            hasher.update(b"unreadable:");
                            hasher.update(path.to_string_lossy().as_bytes());
                            (idx, Digest::from_hasher(hasher))
                        }
                        Err(join_err) => {
                            warn!(path = ?path, error = %join_err, "hash worker panicked; using marker digest");
                            let mut hasher = Hasher::new();
                            hasher.update(b"unreadable:");
                            hasher.update(path.to_string_lossy().as_bytes());
                            (idx, Digest::from_hasher(hasher))
                        }
                    },
                }
            });
        }

        let mut slots: Vec<Option<Digest>> = vec![None; entries.len()];
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((idx, digest)) => slots[idx] = Some(digest),
                Err(err) => {
                    warn!(error = %err, "hash task join error");
                }
            }
            if token.is_cancelled() {
                join_set.abort_all();
                return Err(Cancelled);
            }
        }

        if token.is_cancelled() {
            return Err(Cancelled);
        }

        let mut results = Vec::with_capacity(entries.len());
        for (path, slot) in entries.iter().zip(slots) {
            match slot {
                Some(digest) if !digest.is_cancelled() => results.push(EntryDigest {
                    path: path.clone(),
                    digest,
                }),
                // A cancelled or missing slot without an observed token
                // cancellation means a worker was torn down; report the whole
                // call as cancelled rather than leaking the sentinel.
                _ => return Err(Cancelled),
            }
        }

        debug!(entries = results.len(), "classpath hash complete");
        Ok(results)
    }

    /// Aggregate per-entry digests into the classpath half of a [`CacheKey`].
    ///
    /// `digests` must already be in classpath order; the aggregate is order
    /// sensitive on purpose.
    pub fn aggregate(digests: &[EntryDigest]) -> Digest {
        let mut hasher = Hasher::new();
        for entry in digests {
            hasher.update(entry.path.to_string_lossy().as_bytes());
            hasher.update(entry.digest.as_hex().as_bytes());
        }
        Digest::from_hasher(hasher)
    }

    /// Fingerprint of a project's own sources, in configured source order.
    ///
    /// Blocking; callers on the async runtime wrap this in `spawn_blocking`.
    pub fn fingerprint_sources(&self, project: &Project) -> anyhow::Result<Digest> {
        let mut hasher = Hasher::new();
        for source in &project.sources {
            hasher.update(source.to_string_lossy().as_bytes());
            let digest = self.content.hash_entry(source)?;
            hasher.update(digest.as_hex().as_bytes());
        }
        Ok(Digest::from_hasher(hasher))
    }

    /// Build a full cache key for `project` against an already-hashed
    /// resolved classpath.
    pub fn cache_key(project_sources: Digest, classpath: &[EntryDigest]) -> CacheKey {
        CacheKey {
            sources: project_sources,
            classpath: Self::aggregate(classpath),
        }
    }
}
