//! Insight classification for assessed reading attempts
//!
//! An [`InsightClassifier`] runs an ordered list of [`InsightStrategy`]
//! implementations and keeps the first draft produced:
//!
//! 1. [`GenerativeStrategy`] asks an external text generation service
//!    (see [`GeminiClient`]) and gives up quietly on any failure.
//! 2. [`MetricsStrategy`] derives category, priority, title and description
//!    from the metrics alone and always answers.

pub mod classifier;
pub mod error;
pub mod gemini;
pub mod generative;
pub mod strategy;

pub use classifier::InsightClassifier;
pub use error::{InsightError, Result};
pub use gemini::{GeminiClient, GeminiSettings};
pub use generative::{
    build_prompt, extract_json_payload, normalize_payload, GenerativeClient, GenerativeStrategy,
};
pub use strategy::{InsightContext, InsightDraft, InsightStrategy, MetricsStrategy};
