//! External tool discovery.

use std::path::{Path, PathBuf};

use tracing::debug;

/// Return the first candidate that exists as a regular file.
///
/// Nothing is cached: the filesystem is consulted on every call, so a tool
/// installed or removed between fetches is picked up.
pub fn locate<P: AsRef<Path>>(candidates: &[P]) -> Option<PathBuf> {
    let found = candidates
        .iter()
        .map(AsRef::as_ref)
        .find(|path| path.is_file())
        .map(Path::to_path_buf);
    match &found {
        Some(path) => debug!(tool = %path.display(), "located fetch tool"),
        None => debug!(candidates = candidates.len(), "fetch tool not found"),
    }
    found
}
