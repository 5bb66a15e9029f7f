//! Error types for transactional execution
//!
//! The only recoverable failure of a transaction is a cooperative abort.
//! Broken invariants (re-key collisions, reference arrays in the array log,
//! rollback of an active transaction, guard misuse) panic instead.

use thiserror::Error;

/// Type descriptor of the error raised into initializer code on abort
pub const ABORT_ERROR_DESCRIPTOR: &str = "Ldalvik/system/TransactionAbortError;";

/// Signal raised when a transaction is aborted
///
/// Carries the message of the abort it reports. Initializer code is expected
/// to unwind on receiving it; the engine then rolls the transaction back.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Transaction aborted: {message}")]
pub struct AbortError {
    /// Abort message
    pub message: String,
}

impl AbortError {
    /// Create an abort signal
    pub fn new(message: impl Into<String>) -> Self {
        AbortError {
            message: message.into(),
        }
    }
}

/// Errors surfaced by transactional accessors
#[derive(Debug, Error)]
pub enum TransactionError {
    /// The transaction was aborted (constraint violation or explicit abort)
    #[error(transparent)]
    Aborted(#[from] AbortError),

    /// The heap rejected the access
    #[error("Heap error: {0}")]
    Heap(#[from] txlog_core::Error),
}

impl TransactionError {
    /// Abort signal, if this error is one
    pub fn as_abort(&self) -> Option<&AbortError> {
        match self {
            TransactionError::Aborted(e) => Some(e),
            TransactionError::Heap(_) => None,
        }
    }
}

/// Result type alias for transactional accessors
pub type Result<T> = std::result::Result<T, TransactionError>;
