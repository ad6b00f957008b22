//! Error types for ECL parsing and evaluation.

use thiserror::Error;

/// Errors raised while parsing or evaluating an ECL expression.
#[derive(Error, Debug)]
pub enum EclError {
    /// The expression could not be parsed; the position is reported so a
    /// caller can point the user at the offending character, per §7's
    /// "ECL parse failure (reports position)".
    #[error("ECL parse error at line {line}, column {column}: {message}")]
    Parse {
        /// 1-based line number.
        line: usize,
        /// 1-based column number.
        column: usize,
        /// Human-readable description of the parse failure.
        message: String,
    },

    /// Evaluation needed a component-store lookup that failed.
    #[error("store error during ECL evaluation: {0}")]
    Store(#[from] snomed_store::StoreError),

    /// A concept reference overflowed a valid SCTID.
    #[error("invalid concept id literal: {0}")]
    InvalidConceptId(String),
}

/// Result type for ECL operations.
pub type EclResult<T> = Result<T, EclError>;
