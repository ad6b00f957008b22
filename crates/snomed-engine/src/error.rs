//! Error types for the terminology service facade.

use thiserror::Error;

/// Errors raised by [`crate::TerminologyEngine`] operations.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The component store reported an error.
    #[error("store error: {0}")]
    Store(#[from] snomed_store::StoreError),

    /// The search index reported an error.
    #[error("search index error: {0}")]
    Index(#[from] snomed_search::IndexError),

    /// ECL parsing or evaluation reported an error.
    #[error("ECL error: {0}")]
    Ecl(#[from] snomed_ecl::EclError),

    /// The facade itself was misused (e.g. a second `open` of an
    /// already-open path).
    #[error("usage error: {0}")]
    Usage(String),
}

/// Result type for terminology engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
