//! Error types for insight generation

use std::time::Duration;
use thiserror::Error;

/// Errors raised while talking to the generative service.
///
/// None of these reach the assessment pipeline: the classifier logs them and
/// falls back to the metric-driven strategy.
#[derive(Error, Debug)]
pub enum InsightError {
    /// Network communication error
    #[error("Network error: {0}")]
    Network(String),

    /// Service answered with a non-success status
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Response body could not be decoded
    #[error("Parse error: {0}")]
    Parse(String),

    /// Service answered without any text
    #[error("Empty response from generative service")]
    EmptyResponse,

    /// No API key configured
    #[error("Generative service API key is not configured")]
    MissingApiKey,

    #[error("Generative call timed out after {0:?}")]
    Timeout(Duration),
}

/// Result type for insight operations
pub type Result<T> = std::result::Result<T, InsightError>;

impl InsightError {
    pub fn network<S: Into<String>>(msg: S) -> Self {
        InsightError::Network(msg.into())
    }
}

impl From<reqwest::Error> for InsightError {
    /// The request URL is dropped from the message before it can reach a log.
    fn from(err: reqwest::Error) -> Self {
        let err = err.without_url();
        if err.is_decode() {
            InsightError::Parse(err.to_string())
        } else {
            InsightError::Network(err.to_string())
        }
    }
}
