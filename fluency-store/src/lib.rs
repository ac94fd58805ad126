//! Fluency Assessment Store
//!
//! SQLite persistence for the records the assessment pipeline reads and writes:
//! passages, students, attempts and diagnostics (collaborator data), the
//! single live assessment of each attempt, and the accumulating insight
//! history.

pub mod database;
pub mod models;

pub use database::{AssessmentStore, AttemptHistoryEntry};
pub use models::{
    AssessmentRecord, Attempt, Diagnostic, DiagnosticKind, Insight, InsightCategory,
    InsightPriority, InsightSource, Passage, Recommendations, Student, UnknownVariant,
};
