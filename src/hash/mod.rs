// src/hash/mod.rs

//! Content-addressed hashing of sources and classpath entries.
//!
//! - [`content`] digests a single entry (file or directory tree) with a
//!   per-file memo keyed by modification signature.
//! - [`classpath`] fans content hashing out over a classpath with bounded
//!   parallelism and per-invocation cancellation.
//! - [`macros`] is the best-effort probe for compile-time metaprogramming
//!   markers in compiled class files.

pub mod classpath;
pub mod content;
pub mod macros;

pub use classpath::ClasspathHasher;
pub use content::ContentHasher;
pub use macros::contains_macro_definitions;

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Sentinel hex value standing in for "this entry was never hashed because
/// the invocation was cancelled". Must never appear in a successful result.
const CANCELLED_HEX: &str = "<cancelled>";

/// A blake3 content digest in hex form.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Digest(String);

impl Digest {
    pub(crate) fn from_hasher(hasher: blake3::Hasher) -> Self {
        Digest(hasher.finalize().to_hex().to_string())
    }

    /// The designated cancellation sentinel.
    pub fn cancelled() -> Self {
        Digest(CANCELLED_HEX.to_string())
    }

    pub fn is_cancelled(&self) -> bool {
        self.0 == CANCELLED_HEX
    }

    pub fn as_hex(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", &self.0)
    }
}

/// Composite fingerprint identifying a reusable compilation result.
///
/// Two builds with an equal `CacheKey` for a project must be treated as
/// producing an equivalent result; this equality is the at-most-one-recompute
/// contract the scheduler relies on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Fingerprint of the project's own sources.
    pub sources: Digest,
    /// Aggregated digest over the resolved classpath (direct and transitive
    /// dependency outputs included).
    pub classpath: Digest,
}

/// One (entry, digest) pair from a classpath hash invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryDigest {
    pub path: PathBuf,
    pub digest: Digest,
}
