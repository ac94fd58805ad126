//! Fluency, accuracy and prosody metrics derived from an edit script

use serde::{Deserialize, Serialize};

use crate::aligner::{EditKind, EditOperation};
use crate::tokenizer::PunctuationCounts;

/// Reading rate treated as fully fluent (words per minute)
pub const FLUENT_WORDS_PER_MINUTE: f64 = 120.0;

/// Scores below this trigger a practice hint
pub const PRACTICE_HINT_THRESHOLD: f64 = 60.0;

/// Maximum number of distinct words suggested for review
pub const MAX_REVIEW_WORDS: usize = 5;

pub const FLUENCY_PRACTICE_HINT: &str =
    "Incentivar leitura com ritmo constante para melhorar a fluência.";

pub const PROSODY_PRACTICE_HINT: &str = "Praticar a leitura com entonação e pausas adequadas.";

/// One misread word. An empty side means the word was omitted or inserted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadingError {
    pub expected: String,
    pub spoken: String,
}

impl ReadingError {
    pub fn kind(&self) -> EditKind {
        match (self.expected.is_empty(), self.spoken.is_empty()) {
            (false, true) => EditKind::Omit,
            (true, false) => EditKind::Insert,
            _ => EditKind::Substitute,
        }
    }
}

/// Outcome of analysing one reading attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentResult {
    pub total_words: usize,
    pub correct_words: usize,
    pub words_per_minute: Option<f64>,
    pub accuracy_score: Option<f64>,
    pub fluency_score: Option<f64>,
    pub prosody_score: Option<f64>,
    pub overall_score: Option<f64>,
    pub errors: Vec<ReadingError>,
    pub improvement_points: Vec<String>,
}

impl AssessmentResult {
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// True when no numeric score could be computed.
    pub fn is_unscored(&self) -> bool {
        self.words_per_minute.is_none()
            && self.accuracy_score.is_none()
            && self.fluency_score.is_none()
            && self.prosody_score.is_none()
    }
}

fn clamp_score(value: f64) -> f64 {
    value.clamp(0.0, 100.0)
}

/// Compute all metrics for an aligned attempt.
///
/// Metrics that cannot be measured (no spoken words, no duration, no
/// punctuation in the reference) are `None`, never zero.
pub fn compute_metrics(
    expected: &[String],
    spoken: &[String],
    ops: &[EditOperation],
    punctuation: PunctuationCounts,
    duration_seconds: Option<f64>,
) -> AssessmentResult {
    let total_words = if expected.is_empty() {
        spoken.len()
    } else {
        expected.len()
    };

    let correct_words = ops
        .iter()
        .filter(|op| op.kind == EditKind::Match)
        .map(|op| op.expected.len())
        .sum();

    let errors = collect_errors(expected, spoken, ops);

    let duration = duration_seconds.filter(|d| d.is_finite() && *d > 0.0);
    // A subnormal duration overflows the rate; treat it like no duration
    let words_per_minute = match duration {
        Some(seconds) if !spoken.is_empty() => Some(spoken.len() as f64 / (seconds / 60.0)),
        _ => None,
    }
    .filter(|wpm| wpm.is_finite());

    let accuracy_score = (!spoken.is_empty())
        .then(|| clamp_score(correct_words as f64 / spoken.len() as f64 * 100.0));

    let fluency_score =
        words_per_minute.map(|wpm| clamp_score(wpm / FLUENT_WORDS_PER_MINUTE * 100.0));

    let prosody_score = (punctuation.expected > 0).then(|| {
        clamp_score(punctuation.spoken as f64 / punctuation.expected as f64 * 100.0)
    });

    let overall_score = mean_of_present(&[accuracy_score, fluency_score, prosody_score]);

    let improvement_points = improvement_points(&errors, fluency_score, prosody_score);

    AssessmentResult {
        total_words,
        correct_words,
        words_per_minute,
        accuracy_score,
        fluency_score,
        prosody_score,
        overall_score,
        errors,
        improvement_points,
    }
}

/// Expand every non-match run into per-word error records.
fn collect_errors(expected: &[String], spoken: &[String], ops: &[EditOperation]) -> Vec<ReadingError> {
    let mut errors = Vec::new();

    for op in ops {
        match op.kind {
            EditKind::Match => {}
            EditKind::Substitute => {
                let pairs = op
                    .expected_tokens(expected)
                    .iter()
                    .zip(op.spoken_tokens(spoken));
                errors.extend(pairs.map(|(e, s)| ReadingError {
                    expected: e.clone(),
                    spoken: s.clone(),
                }));
            }
            EditKind::Omit => {
                errors.extend(op.expected_tokens(expected).iter().map(|e| ReadingError {
                    expected: e.clone(),
                    spoken: String::new(),
                }));
            }
            EditKind::Insert => {
                errors.extend(op.spoken_tokens(spoken).iter().map(|s| ReadingError {
                    expected: String::new(),
                    spoken: s.clone(),
                }));
            }
        }
    }

    errors
}

fn mean_of_present(values: &[Option<f64>]) -> Option<f64> {
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    if present.is_empty() {
        return None;
    }
    Some(present.iter().sum::<f64>() / present.len() as f64)
}

/// Review hints for misread words, then rate and intonation hints.
fn improvement_points(
    errors: &[ReadingError],
    fluency_score: Option<f64>,
    prosody_score: Option<f64>,
) -> Vec<String> {
    let mut review_words: Vec<&str> = Vec::new();
    for error in errors {
        if review_words.len() == MAX_REVIEW_WORDS {
            break;
        }
        let word = error.expected.as_str();
        if !word.is_empty() && !review_words.contains(&word) {
            review_words.push(word);
        }
    }

    let mut points: Vec<String> = review_words
        .into_iter()
        .map(|word| format!("Revisar a palavra '{}'.", word))
        .collect();

    if fluency_score.is_some_and(|score| score < PRACTICE_HINT_THRESHOLD) {
        points.push(FLUENCY_PRACTICE_HINT.to_string());
    }
    if prosody_score.is_some_and(|score| score < PRACTICE_HINT_THRESHOLD) {
        points.push(PROSODY_PRACTICE_HINT.to_string());
    }

    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aligner::align;
    use approx::assert_abs_diff_eq;

    fn words(text: &str) -> Vec<String> {
        text.split_whitespace().map(str::to_string).collect()
    }

    fn run(expected: &str, spoken: &str, punctuation: PunctuationCounts, duration: Option<f64>) -> AssessmentResult {
        let expected = words(expected);
        let spoken = words(spoken);
        let ops = align(&expected, &spoken);
        compute_metrics(&expected, &spoken, &ops, punctuation, duration)
    }

    #[test]
    fn test_perfect_reading() {
        let result = run("o gato subiu no telhado", "o gato subiu no telhado", PunctuationCounts::default(), Some(3.0));

        assert_eq!(result.total_words, 5);
        assert_eq!(result.correct_words, 5);
        assert!(result.errors.is_empty());
        assert_abs_diff_eq!(result.words_per_minute.unwrap(), 100.0, epsilon = 1e-9);
        assert_abs_diff_eq!(result.accuracy_score.unwrap(), 100.0);
        assert_abs_diff_eq!(result.fluency_score.unwrap(), 100.0 / 1.2, epsilon = 1e-9);
        assert_eq!(result.prosody_score, None);
        assert!(result.improvement_points.is_empty());
    }

    #[test]
    fn test_zero_or_missing_duration_disables_rate() {
        for duration in [None, Some(0.0), Some(-4.0), Some(f64::NAN)] {
            let result = run("a b", "a b", PunctuationCounts::default(), duration);
            assert_eq!(result.words_per_minute, None);
            assert_eq!(result.fluency_score, None);
            assert_eq!(result.overall_score, result.accuracy_score);
        }
    }

    #[test]
    fn test_subnormal_duration_disables_rate() {
        let result = run("o gato", "o gato", PunctuationCounts::default(), Some(1e-310));

        assert_eq!(result.words_per_minute, None);
        assert_eq!(result.fluency_score, None);
        assert_eq!(result.overall_score, Some(100.0));
    }

    #[test]
    fn test_fluency_clamped_at_100() {
        let result = run("a b c d e f", "a b c d e f", PunctuationCounts::default(), Some(0.5));

        assert!(result.words_per_minute.unwrap() > 600.0);
        assert_eq!(result.fluency_score, Some(100.0));
    }

    #[test]
    fn test_prosody_requires_reference_punctuation() {
        let none = run("a b", "a b", PunctuationCounts { expected: 0, spoken: 3 }, None);
        assert_eq!(none.prosody_score, None);

        let half = run("a b", "a b", PunctuationCounts { expected: 2, spoken: 1 }, None);
        assert_eq!(half.prosody_score, Some(50.0));

        let over = run("a b", "a b", PunctuationCounts { expected: 1, spoken: 4 }, None);
        assert_eq!(over.prosody_score, Some(100.0));
    }

    #[test]
    fn test_overall_is_mean_of_present_scores() {
        let result = run("a b c d", "a b x", PunctuationCounts { expected: 2, spoken: 1 }, Some(3.0));

        let accuracy = result.accuracy_score.unwrap();
        let fluency = result.fluency_score.unwrap();
        let prosody = result.prosody_score.unwrap();
        assert_abs_diff_eq!(
            result.overall_score.unwrap(),
            (accuracy + fluency + prosody) / 3.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_overall_absent_without_any_score() {
        let result = run("a b", "", PunctuationCounts::default(), Some(10.0));
        assert_eq!(result.overall_score, None);
        assert!(result.is_unscored());
    }

    #[test]
    fn test_review_words_unique_in_first_appearance_order() {
        let result = run(
            "um dois três um quatro cinco seis sete",
            "",
            PunctuationCounts::default(),
            None,
        );

        assert_eq!(
            result.improvement_points,
            vec![
                "Revisar a palavra 'um'.",
                "Revisar a palavra 'dois'.",
                "Revisar a palavra 'três'.",
                "Revisar a palavra 'quatro'.",
                "Revisar a palavra 'cinco'.",
            ]
        );
    }

    #[test]
    fn test_practice_hints_follow_review_words() {
        // 2 words in 4s = 30 wpm -> fluency 25; prosody 0 of 1
        let result = run("a b c", "a x", PunctuationCounts { expected: 1, spoken: 0 }, Some(4.0));

        assert_eq!(
            result.improvement_points,
            vec![
                "Revisar a palavra 'b'.".to_string(),
                "Revisar a palavra 'c'.".to_string(),
                FLUENCY_PRACTICE_HINT.to_string(),
                PROSODY_PRACTICE_HINT.to_string(),
            ]
        );
    }

    #[test]
    fn test_insert_errors_do_not_produce_review_words() {
        let result = run("", "olá mundo", PunctuationCounts::default(), None);

        assert_eq!(result.total_words, 2);
        assert_eq!(result.error_count(), 2);
        assert!(result.errors.iter().all(|e| e.kind() == EditKind::Insert));
        assert!(result.improvement_points.is_empty());
        assert_eq!(result.accuracy_score, Some(0.0));
    }

    #[test]
    fn test_error_kind_classification() {
        let sub = ReadingError { expected: "a".into(), spoken: "b".into() };
        let omit = ReadingError { expected: "a".into(), spoken: String::new() };
        let insert = ReadingError { expected: String::new(), spoken: "b".into() };

        assert_eq!(sub.kind(), EditKind::Substitute);
        assert_eq!(omit.kind(), EditKind::Omit);
        assert_eq!(insert.kind(), EditKind::Insert);
    }
}
