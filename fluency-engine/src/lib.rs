//! Reading Fluency Assessment Engine
//!
//! Compares what a student actually read (a speech-to-text transcript)
//! against the passage they were asked to read.
//!
//! ## Pipeline
//!
//! - **Tokenizer**: lowercase Latin words, sentence-terminal punctuation counts
//! - **Aligner**: word-level edit script (match / substitute / omit / insert)
//! - **Metrics**: rate, accuracy, fluency, prosody, overall score, review hints
//!
//! Everything here is pure and synchronous; an attempt with missing input
//! yields a partially populated result instead of an error.

pub mod aligner;
pub mod metrics;
pub mod tokenizer;

pub use aligner::{align, EditKind, EditOperation};
pub use metrics::{compute_metrics, AssessmentResult, ReadingError};
pub use tokenizer::{count_sentence_terminals, split_sentences, tokenize, PunctuationCounts};

use tracing::debug;

/// Run tokenizer, aligner and metric calculator over one attempt.
pub fn analyze_reading(
    transcript: &str,
    reference_text: &str,
    duration_seconds: Option<f64>,
) -> AssessmentResult {
    let spoken = tokenize(transcript);
    let expected = tokenize(reference_text);
    let ops = align(&expected, &spoken);
    let punctuation = PunctuationCounts::from_texts(reference_text, transcript);

    let result = compute_metrics(&expected, &spoken, &ops, punctuation, duration_seconds);

    debug!(
        expected_words = expected.len(),
        spoken_words = spoken.len(),
        runs = ops.len(),
        errors = result.error_count(),
        "Reading analysed"
    );

    result
}
