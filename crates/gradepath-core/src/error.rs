//! Grading error types.
//!
//! Pure services return `GradeResult`; the pipeline and store layers carry
//! these inside `anyhow::Error` and downcast them to classify retries
//! without string matching.

use thiserror::Error;

/// Errors raised by the grading core and its persistence collaborator.
///
/// An answer that cannot be graded automatically is not an error: it is
/// reported as [`Correctness::PendingReview`](crate::model::Correctness).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GradeError {
    /// Malformed input, rejected before any computation.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Stored data contradicts itself, e.g. an answer to a question the
    /// activity does not own.
    #[error("inconsistent state: {0}")]
    InconsistentState(String),

    /// A full-recompute overwrite collided with a concurrent writer.
    #[error("concurrent update of {entity}: expected version {expected}, found {found}")]
    ConcurrencyConflict {
        entity: String,
        expected: u64,
        found: u64,
    },

    /// A referenced entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),
}

impl GradeError {
    /// Returns `true` if retrying with a fresh read may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GradeError::ConcurrencyConflict { .. })
    }
}

pub type GradeResult<T> = Result<T, GradeError>;
