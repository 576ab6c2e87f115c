// src/hash/macros.rs

//! Best-effort detection of compile-time metaprogramming code in classpath
//! entries.
//!
//! Entries that define macros disable certain caching optimisations in the
//! surrounding server, so the scheduler wants a cheap per-entry flag. The
//! probe scans compiled class files for references to the macro context
//! types; jars are scanned as raw bytes (constant-pool strings are stored
//! uncompressed often enough for a byte scan to be useful). Errors degrade
//! to `false` with a warning, never to a failed build.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::warn;

/// Constant-pool strings referenced by macro definitions.
const MACRO_MARKERS: [&[u8]; 2] = [
    b"scala/reflect/macros/blackbox/Context",
    b"scala/reflect/macros/whitebox/Context",
];

/// Flag each entry that appears to contain macro definitions.
///
/// Independent of the hashing path; purely advisory.
pub fn contains_macro_definitions(entries: &[PathBuf]) -> HashMap<PathBuf, bool> {
    entries
        .iter()
        .map(|entry| (entry.clone(), entry_has_macros(entry)))
        .collect()
}

fn entry_has_macros(entry: &Path) -> bool {
    if entry.is_dir() {
        dir_has_macros(entry)
    } else if entry.is_file() {
        file_has_macros(entry)
    } else {
        false
    }
}

fn dir_has_macros(dir: &Path) -> bool {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            warn!(path = ?dir, error = %err, "macro probe: cannot read directory");
            return false;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            if dir_has_macros(&path) {
                return true;
            }
        } else if path.extension().is_some_and(|ext| ext == "class") && file_has_macros(&path) {
            return true;
        }
    }
    false
}

fn file_has_macros(path: &Path) -> bool {
    match std::fs::read(path) {
        Ok(bytes) => MACRO_MARKERS
            .iter()
            .any(|marker| contains_subslice(&bytes, marker)),
        Err(err) => {
            warn!(path = ?path, error = %err, "macro probe: cannot read file");
            false
        }
    }
}

fn contains_subslice(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() || haystack.len() < needle.len() {
        return false;
    }
    haystack.windows(needle.len()).any(|w| w == needle)
}
