//! The single opener contract for [`crate::Store`].

use std::path::{Path, PathBuf};

/// Options accepted by [`crate::Store::open`].
///
/// This is the engine's single opener contract named in the external
/// interface: every caller of the store goes through `{ path, read_only }`,
/// never a process-wide global.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Directory the store is rooted at. `store.db`, `search.db/`, and the
    /// lockfile are created under this path.
    pub path: PathBuf,
    /// Open without taking the exclusive lock that blocks a second opener.
    /// Every mutating method on [`crate::Store`] (`put_*`, `build_indices`,
    /// `compact`) checks this flag itself and returns
    /// [`crate::StoreError::ReadOnly`] rather than touching the database.
    pub read_only: bool,
}

impl StoreOptions {
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
