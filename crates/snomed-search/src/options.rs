//! The single opener contract for [`crate::SearchIndex`].

use std::path::{Path, PathBuf};

/// Options accepted by [`crate::SearchIndex::open`].
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Directory the index is rooted at (this is the engine's `search.db/`
    /// referenced in the on-disk layout; the `redb` container and lockfile
    /// live under it).
    pub path: PathBuf,
    /// Open without taking the exclusive lock that blocks a second opener.
    pub read_only: bool,
}

impl SearchOptions {
    /// Read-write options rooted at `path`.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            read_only: false,
        }
    }

    /// Read-only options rooted at `path`.
    pub fn read_only(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            read_only: true,
        }
    }
}
