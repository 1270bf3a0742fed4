// Path normalization
// Compiled units and watcher events arrive with platform separators; everything
// downstream works on '/'-separated strings.

use std::path::Path;

/// Canonical form: '/' separators, no trailing separator. Idempotent.
pub fn normalize(path: &str) -> String {
    let mut normalized = path.replace('\\', "/");

    while normalized.len() > 1 && normalized.ends_with('/') {
        normalized.pop();
    }

    normalized
}

/// Normalize a filesystem path (lossy on non UTF-8 names)
pub fn normalize_path(path: &Path) -> String {
    normalize(&path.to_string_lossy())
}

/// Split a normalized path into its non-empty segments
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty() && *s != ".")
}
