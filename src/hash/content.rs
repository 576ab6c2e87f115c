// src/hash/content.rs

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

use anyhow::{Context, Result};
use blake3::Hasher;
use tracing::debug;

use crate::hash::Digest;

/// Modification signature used to decide whether a memoized digest is still
/// valid for a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileSignature {
    mtime: SystemTime,
    len: u64,
}

impl FileSignature {
    fn of(path: &Path) -> Result<Self> {
        let meta = std::fs::metadata(path)
            .with_context(|| format!("reading metadata for {:?}", path))?;
        let mtime = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        Ok(Self {
            mtime,
            len: meta.len(),
        })
    }
}

/// Computes deterministic digests for classpath entries, memoizing per
/// absolute path + modification signature.
///
/// The memo is append-or-replace only and shared across concurrent hash
/// invocations; a cancelled invocation simply stops consulting it, so
/// cancellation cannot poison state observed by sibling invocations.
#[derive(Debug, Default)]
pub struct ContentHasher {
    memo: Mutex<HashMap<PathBuf, (FileSignature, Digest)>>,
}

impl ContentHasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Digest a single classpath entry.
    ///
    /// - plain file (e.g. a jar): content hash
    /// - directory: structural hash over contained files (sorted relative
    ///   path + per-file content digest)
    /// - missing path: a stable marker digest, so a disappeared entry still
    ///   yields a deterministic key instead of an error
    pub fn hash_entry(&self, path: &Path) -> Result<Digest> {
        if path.is_dir() {
            self.hash_directory(path)
        } else if path.is_file() {
            self.hash_file(path)
        } else {
            let mut hasher = Hasher::new();
            hasher.update(b"missing:");
            hasher.update(path.to_string_lossy().as_bytes());
            Ok(Digest::from_hasher(hasher))
        }
    }

    /// Content hash of a single file, served from the memo when the
    /// modification signature is unchanged.
    pub fn hash_file(&self, path: &Path) -> Result<Digest> {
        let sig = FileSignature::of(path)?;

        if let Ok(memo) = self.memo.lock() {
            if let Some((cached_sig, digest)) = memo.get(path) {
                if *cached_sig == sig {
                    return Ok(digest.clone());
                }
            }
        }

        debug!("memo miss: hashing {:?}", path);
        let digest = compute_file_digest(path)?;

        if let Ok(mut memo) = self.memo.lock() {
            memo.insert(path.to_path_buf(), (sig, digest.clone()));
        }
        Ok(digest)
    }

    /// Structural hash of a directory tree: relative paths plus per-file
    /// content digests, in sorted order so the result is independent of
    /// directory iteration order.
    fn hash_directory(&self, dir: &Path) -> Result<Digest> {
        let mut files = Vec::new();
        collect_files(dir, &mut files)?;
        files.sort();

        let mut hasher = Hasher::new();
        for file in files {
            let rel = file.strip_prefix(dir).unwrap_or(&file);
            hasher.update(rel.to_string_lossy().as_bytes());
            let file_digest = self.hash_file(&file)?;
            hasher.update(file_digest.as_hex().as_bytes());
        }
        Ok(Digest::from_hasher(hasher))
    }
}

/// Streaming blake3 over a file's contents.
fn compute_file_digest(path: &Path) -> Result<Digest> {
    let mut hasher = Hasher::new();
    let mut file =
        File::open(path).with_context(|| format!("opening file for hashing: {:?}", path))?;
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(Digest::from_hasher(hasher))
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in
        std::fs::read_dir(dir).with_context(|| format!("reading directory {:?}", dir))?
    {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(&path, out)?;
        } else if path.is_file() {
            out.push(path);
        }
    }
    Ok(())
}
