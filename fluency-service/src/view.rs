//! Display-ready metrics of one attempt

use chrono::{DateTime, Utc};
use fluency_store::{AssessmentRecord, Attempt, Insight, InsightCategory, InsightPriority};
use serde::Serialize;
use uuid::Uuid;

/// Insight as listed next to an attempt's metrics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsightSummary {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub category: InsightCategory,
    pub priority: InsightPriority,
    pub created_at: DateTime<Utc>,
}

impl From<Insight> for InsightSummary {
    fn from(insight: Insight) -> Self {
        Self {
            id: insight.id,
            title: insight.title,
            description: insight.description,
            category: insight.category,
            priority: insight.priority,
            created_at: insight.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptMetrics {
    pub attempt_id: Uuid,
    pub passage_id: Uuid,
    pub student_id: Uuid,
    /// Recorded duration, derived from words and rate when missing (0 if unknown)
    pub duration_seconds: f64,
    pub recorded_at: DateTime<Utc>,
    pub transcript: Option<String>,
    pub errors_count: usize,
    pub words_per_minute: Option<f64>,
    pub accuracy_percentage: Option<f64>,
    pub fluency_score: Option<f64>,
    pub overall_score: Option<f64>,
    pub prosody_score: Option<f64>,
    pub correct_words_count: Option<i64>,
    pub total_words: Option<i64>,
    pub improvement_points: Vec<String>,
    pub insights: Vec<InsightSummary>,
}

fn positive(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v > 0.0)
}

impl AttemptMetrics {
    /// Combine an attempt with its record (if any) and its student's insights.
    ///
    /// Without a record, rate and accuracy are estimated from the whitespace
    /// word count of the transcript.
    pub fn build(
        attempt: &Attempt,
        record: Option<&AssessmentRecord>,
        insights: Vec<Insight>,
    ) -> Self {
        let word_count = attempt
            .transcript
            .as_deref()
            .map(|t| t.split_whitespace().count())
            .unwrap_or(0);

        let mut duration = positive(attempt.duration_seconds);
        let mut errors_count = 0;
        let mut words_per_minute = None;
        let mut accuracy = None;
        let mut fluency = None;
        let mut overall = None;
        let mut prosody = None;
        let mut correct_words = None;
        let mut total_words = None;
        let mut improvement_points = Vec::new();

        if let Some(record) = record {
            errors_count = record.error_count();
            words_per_minute = record.words_per_minute;
            accuracy = record.accuracy_score;
            fluency = record.fluency_score;
            overall = record.overall_score;
            prosody = record.prosody_score;
            correct_words = Some(record.correct_words);
            total_words = Some(record.total_words);
            improvement_points = record.improvement_points.clone();

            if duration.is_none() && record.total_words > 0 {
                if let Some(wpm) = positive(words_per_minute) {
                    duration = Some(record.total_words as f64 / wpm * 60.0);
                }
            }
        }

        if words_per_minute.is_none() && word_count > 0 {
            if let Some(seconds) = positive(attempt.duration_seconds) {
                words_per_minute =
                    Some(word_count as f64 / (seconds / 60.0)).filter(|w| w.is_finite());
            }
        }

        if accuracy.is_none() && word_count > 0 {
            let correct = word_count as f64 - errors_count as f64;
            accuracy = Some((correct / word_count as f64 * 100.0).clamp(0.0, 100.0));
        }

        if duration.is_none() && word_count > 0 {
            if let Some(wpm) = positive(words_per_minute) {
                duration = Some(word_count as f64 / wpm * 60.0);
            }
        }

        Self {
            attempt_id: attempt.id,
            passage_id: attempt.passage_id,
            student_id: attempt.student_id,
            duration_seconds: duration.unwrap_or(0.0),
            recorded_at: attempt.recorded_at,
            transcript: attempt.transcript.clone(),
            errors_count,
            words_per_minute,
            accuracy_percentage: accuracy,
            fluency_score: fluency,
            overall_score: overall,
            prosody_score: prosody,
            correct_words_count: correct_words,
            total_words,
            improvement_points,
            insights: insights.into_iter().map(InsightSummary::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use fluency_engine::analyze_reading;

    fn attempt(transcript: Option<&str>, duration: Option<f64>) -> Attempt {
        Attempt {
            id: Uuid::new_v4(),
            student_id: Uuid::new_v4(),
            passage_id: Uuid::new_v4(),
            duration_seconds: duration,
            transcript: transcript.map(str::to_string),
            created_by: None,
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn test_view_uses_record_when_present() {
        let attempt = attempt(Some("a menina andou"), Some(2.0));
        let result = analyze_reading("a menina andou", "a menina correu rápido", Some(2.0));
        let record = AssessmentRecord::from_result(attempt.id, &result);

        let view = AttemptMetrics::build(&attempt, Some(&record), Vec::new());

        assert_eq!(view.errors_count, 2);
        assert_eq!(view.correct_words_count, Some(2));
        assert_eq!(view.total_words, Some(4));
        assert_abs_diff_eq!(view.words_per_minute.unwrap(), 90.0, epsilon = 1e-9);
        assert_abs_diff_eq!(view.accuracy_percentage.unwrap(), 200.0 / 3.0, epsilon = 1e-9);
        assert_eq!(view.duration_seconds, 2.0);
    }

    #[test]
    fn test_view_estimates_without_record() {
        let attempt = attempt(Some("era uma vez um gato"), Some(10.0));

        let view = AttemptMetrics::build(&attempt, None, Vec::new());

        assert_abs_diff_eq!(view.words_per_minute.unwrap(), 30.0, epsilon = 1e-9);
        assert_eq!(view.accuracy_percentage, Some(100.0));
        assert_eq!(view.errors_count, 0);
        assert_eq!(view.total_words, None);
        assert!(view.improvement_points.is_empty());
    }

    #[test]
    fn test_view_derives_missing_duration_from_record() {
        let attempt = attempt(Some("o gato subiu no telhado"), None);
        let mut record = AssessmentRecord::from_result(
            attempt.id,
            &analyze_reading("o gato subiu no telhado", "o gato subiu no telhado", Some(3.0)),
        );
        record.words_per_minute = Some(100.0);

        let view = AttemptMetrics::build(&attempt, Some(&record), Vec::new());

        assert_abs_diff_eq!(view.duration_seconds, 3.0, epsilon = 1e-9);
    }

    #[test]
    fn test_view_ignores_subnormal_duration() {
        let view = AttemptMetrics::build(&attempt(Some("o gato"), Some(1e-310)), None, Vec::new());

        assert_eq!(view.words_per_minute, None);
        assert_eq!(view.duration_seconds, 1e-310);
    }

    #[test]
    fn test_view_without_anything() {
        let view = AttemptMetrics::build(&attempt(None, None), None, Vec::new());

        assert_eq!(view.duration_seconds, 0.0);
        assert_eq!(view.words_per_minute, None);
        assert_eq!(view.accuracy_percentage, None);
    }
}
