//! Error types for the search index.

use thiserror::Error;

/// Errors the search index can raise.
#[derive(Error, Debug)]
pub enum IndexError {
    /// I/O failure opening or writing the on-disk index.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The underlying `redb` database reported an error.
    #[error("redb database error: {0}")]
    Database(#[from] redb::DatabaseError),

    /// A `redb` transaction failed.
    #[error("redb transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    /// A `redb` table operation failed.
    #[error("redb table error: {0}")]
    Table(#[from] redb::TableError),

    /// A `redb` storage-level error occurred.
    #[error("redb storage error: {0}")]
    Storage(#[from] redb::StorageError),

    /// A `redb` commit failed.
    #[error("redb commit error: {0}")]
    Commit(#[from] redb::CommitError),

    /// A compaction pass failed.
    #[error("redb compaction error: {0}")]
    Compact(#[from] redb::CompactionError),

    /// A stored document or posting could not be decoded.
    #[error("corrupt search index entry: {0}")]
    Corrupt(String),

    /// A second opener tried to take the same index path.
    #[error("search index at {path} is locked by another opener")]
    Locked {
        /// The contended path.
        path: String,
    },

    /// A write was attempted against a read-only index.
    #[error("search index at {path} is read-only")]
    ReadOnly {
        /// The read-only path.
        path: String,
    },
}

/// Result type for search index operations.
pub type IndexResult<T> = Result<T, IndexError>;
