//! Word and punctuation extraction from raw reading text

use regex::Regex;
use std::sync::LazyLock;

/// Latin letters (with the Latin-1 accented range) and apostrophes.
static WORD_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-zÀ-ÖØ-öø-ÿ']+").expect("word pattern is valid"));

static SENTENCE_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]+").expect("sentence pattern is valid"));

/// Split `text` into lowercase word tokens.
///
/// Digits, punctuation and whitespace are separators. Duplicates are kept
/// because position matters for alignment.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    WORD_PATTERN
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Count sentence-terminal marks (`.`, `!`, `?`) in the raw text.
pub fn count_sentence_terminals(text: &str) -> usize {
    text.chars().filter(|c| matches!(c, '.' | '!' | '?')).count()
}

/// Split text into trimmed, non-empty sentences.
pub fn split_sentences(text: &str) -> Vec<String> {
    SENTENCE_BOUNDARY
        .split(text)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Terminal punctuation counts for the reference text and the transcript.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PunctuationCounts {
    pub expected: usize,
    pub spoken: usize,
}

impl PunctuationCounts {
    pub fn from_texts(reference: &str, transcript: &str) -> Self {
        Self {
            expected: count_sentence_terminals(reference),
            spoken: count_sentence_terminals(transcript),
        }
    }
}
