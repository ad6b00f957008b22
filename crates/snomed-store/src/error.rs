//! Error types for the component store.

use thiserror::Error;

/// Errors raised by [`crate::Store`] operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// I/O failure opening or writing the backing file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The on-disk path is already held open by another process.
    #[error("store at {path} is locked by another process")]
    Locked {
        /// Path of the locked store.
        path: String,
    },

    /// The primary container failed to open or is inconsistent.
    #[error("store database error: {0}")]
    Database(#[from] redb::DatabaseError),

    /// A transaction could not be started.
    #[error("store transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    /// A transaction failed to commit.
    #[error("store commit error: {0}")]
    Commit(#[from] redb::CommitError),

    /// A table could not be opened within a transaction.
    #[error("store table error: {0}")]
    Table(#[from] redb::TableError),

    /// A read or write against a table failed.
    #[error("store storage error: {0}")]
    Storage(#[from] redb::StorageError),

    /// A committed value failed to (de)serialize.
    #[error("store record corrupt: {0}")]
    Corrupt(String),

    /// A compaction pass failed.
    #[error("compaction error: {0}")]
    Compact(#[from] redb::CompactionError),

    /// A mutating call was made against a store opened with `read_only: true`.
    #[error("store at {path} is open read-only")]
    ReadOnly {
        /// Path of the read-only store.
        path: String,
    },
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
