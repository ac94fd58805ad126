//! Error types for the assessment pipeline

use thiserror::Error;
use uuid::Uuid;

/// Failures surfaced to callers of the assessment service.
///
/// Missing inputs (no transcript, no passage text) are not errors; they
/// produce a skipped outcome instead.
#[derive(Error, Debug)]
pub enum AssessmentError {
    #[error("Invalid attempt id '{0}'")]
    InvalidAttemptId(String),

    #[error("Invalid student id '{0}'")]
    InvalidStudentId(String),

    #[error("Attempt not found: {0}")]
    AttemptNotFound(Uuid),

    /// Storage failure
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Result type for assessment operations
pub type Result<T> = std::result::Result<T, AssessmentError>;
