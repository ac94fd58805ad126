//! Reading assessment service
//!
//! Ties the workspace together: loads attempts from the store, runs the
//! fluency engine, upserts the assessment record and records an insight
//! chosen by the classifier.

pub mod config;
pub mod error;
pub mod service;
pub mod view;

pub use config::{FluencyConfig, GenerativeConfig};
pub use error::{AssessmentError, Result};
pub use service::{parse_attempt_id, AssessmentOutcome, AssessmentService, SkipReason};
pub use view::{AttemptMetrics, InsightSummary};
