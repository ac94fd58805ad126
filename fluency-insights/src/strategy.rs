//! Insight strategies and the deterministic metric-driven fallback

use async_trait::async_trait;
use fluency_engine::AssessmentResult;
use fluency_store::{
    Attempt, AttemptHistoryEntry, Diagnostic, InsightCategory, InsightPriority, InsightSource,
    Student,
};

/// Accuracy at or above this (with at most one error) counts as progress
pub const PROGRESS_ACCURACY: f64 = 85.0;

/// Accuracy below this needs attention
pub const ATTENTION_ACCURACY: f64 = 60.0;

/// This many errors need attention regardless of accuracy
pub const ATTENTION_ERROR_COUNT: usize = 5;

/// Improvement points quoted in a fallback description
const MAX_QUOTED_POINTS: usize = 3;

/// Insight content before it is owned, stamped and stored
#[derive(Debug, Clone, PartialEq)]
pub struct InsightDraft {
    pub category: InsightCategory,
    pub priority: InsightPriority,
    pub title: String,
    pub description: String,
    pub source: InsightSource,
}

/// Everything known about the attempt being classified
#[derive(Debug, Clone)]
pub struct InsightContext {
    pub student: Student,
    pub attempt: Attempt,
    /// Earlier transcribed attempts, newest first, current one excluded
    pub history: Vec<AttemptHistoryEntry>,
    /// Latest diagnostics of the student, newest first
    pub diagnostics: Vec<Diagnostic>,
}

/// One way of turning an assessment into an insight draft.
///
/// Strategies never fail: `None` means "no opinion" and the classifier moves
/// on to the next one.
#[async_trait]
pub trait InsightStrategy: Send + Sync {
    /// Strategy identifier used in logs
    fn name(&self) -> &'static str;

    async fn propose(
        &self,
        result: &AssessmentResult,
        context: &InsightContext,
    ) -> Option<InsightDraft>;
}

/// Rule-based classification from the computed metrics alone
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsStrategy;

impl MetricsStrategy {
    pub fn new() -> Self {
        Self
    }

    /// Category and priority from accuracy and error count.
    ///
    /// Attention wins over progress when both apply.
    pub fn categorize(result: &AssessmentResult) -> (InsightCategory, InsightPriority) {
        let errors = result.error_count();
        let accuracy = result.accuracy_score;

        if accuracy.is_some_and(|a| a < ATTENTION_ACCURACY) || errors >= ATTENTION_ERROR_COUNT {
            return (InsightCategory::AttentionNeeded, InsightPriority::High);
        }
        if accuracy.is_some_and(|a| a >= PROGRESS_ACCURACY) && errors <= 1 {
            return (InsightCategory::Progress, InsightPriority::Low);
        }
        (InsightCategory::Suggestion, InsightPriority::Medium)
    }

    pub fn title(result: &AssessmentResult) -> String {
        let mut parts = Vec::new();
        if let Some(accuracy) = result.accuracy_score {
            parts.push(format!("Acurácia {:.0}%", accuracy));
        }
        if let Some(wpm) = result.words_per_minute {
            parts.push(format!("PPM {:.0}", wpm));
        }
        if parts.is_empty() {
            return "Análise da leitura".to_string();
        }
        parts.join(" · ")
    }

    pub fn description(result: &AssessmentResult) -> String {
        let mut parts = Vec::new();
        if let Some(accuracy) = result.accuracy_score {
            parts.push(format!("A leitura alcançou {:.1}% de acurácia", accuracy));
        }
        if let Some(wpm) = result.words_per_minute {
            parts.push(format!("Velocidade estimada em {:.0} palavras por minuto", wpm));
        }
        if let Some(fluency) = result.fluency_score {
            parts.push(format!("Fluência estimada em {:.0}", fluency));
        }
        if let Some(prosody) = result.prosody_score {
            parts.push(format!("Prosódia estimada em {:.0}", prosody));
        }
        let errors = result.error_count();
        if errors > 0 {
            parts.push(format!("Foram identificados {} desvios na leitura", errors));
        }

        let points: Vec<&str> = result
            .improvement_points
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .take(MAX_QUOTED_POINTS)
            .collect();
        if !points.is_empty() {
            parts.push(format!("Pontos de melhoria: {}", points.join(", ")));
        }

        if parts.is_empty() {
            parts.push("Sem métricas suficientes para gerar um resumo detalhado".to_string());
        }
        format!("{}.", parts.join(". "))
    }

    pub fn draft(result: &AssessmentResult) -> InsightDraft {
        let (category, priority) = Self::categorize(result);
        InsightDraft {
            category,
            priority,
            title: Self::title(result),
            description: Self::description(result),
            source: InsightSource::Metrics,
        }
    }
}

#[async_trait]
impl InsightStrategy for MetricsStrategy {
    fn name(&self) -> &'static str {
        "metrics"
    }

    async fn propose(
        &self,
        result: &AssessmentResult,
        _context: &InsightContext,
    ) -> Option<InsightDraft> {
        Some(Self::draft(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fluency_engine::{analyze_reading, ReadingError};

    fn result_with(accuracy: Option<f64>, errors: usize) -> AssessmentResult {
        AssessmentResult {
            total_words: 10,
            correct_words: 10usize.saturating_sub(errors),
            words_per_minute: None,
            accuracy_score: accuracy,
            fluency_score: None,
            prosody_score: None,
            overall_score: accuracy,
            errors: (0..errors)
                .map(|i| ReadingError {
                    expected: format!("w{}", i),
                    spoken: String::new(),
                })
                .collect(),
            improvement_points: Vec::new(),
        }
    }

    #[test]
    fn test_categorize_thresholds() {
        assert_eq!(
            MetricsStrategy::categorize(&result_with(Some(85.0), 1)),
            (InsightCategory::Progress, InsightPriority::Low)
        );
        assert_eq!(
            MetricsStrategy::categorize(&result_with(Some(84.9), 0)),
            (InsightCategory::Suggestion, InsightPriority::Medium)
        );
        assert_eq!(
            MetricsStrategy::categorize(&result_with(Some(90.0), 2)),
            (InsightCategory::Suggestion, InsightPriority::Medium)
        );
        assert_eq!(
            MetricsStrategy::categorize(&result_with(Some(59.9), 0)),
            (InsightCategory::AttentionNeeded, InsightPriority::High)
        );
        assert_eq!(
            MetricsStrategy::categorize(&result_with(None, 0)),
            (InsightCategory::Suggestion, InsightPriority::Medium)
        );
    }

    #[test]
    fn test_many_errors_override_high_accuracy() {
        assert_eq!(
            MetricsStrategy::categorize(&result_with(Some(95.0), 5)),
            (InsightCategory::AttentionNeeded, InsightPriority::High)
        );
    }

    #[test]
    fn test_title_and_description_for_partial_reading() {
        let result = analyze_reading("a menina andou", "a menina correu rápido", Some(2.0));

        assert_eq!(MetricsStrategy::title(&result), "Acurácia 67% · PPM 90");
        assert_eq!(
            MetricsStrategy::description(&result),
            "A leitura alcançou 66.7% de acurácia. \
             Velocidade estimada em 90 palavras por minuto. \
             Fluência estimada em 75. \
             Foram identificados 2 desvios na leitura. \
             Pontos de melhoria: Revisar a palavra 'correu'., Revisar a palavra 'rápido'.."
        );
    }

    #[test]
    fn test_title_and_description_without_metrics() {
        let result = result_with(None, 0);

        assert_eq!(MetricsStrategy::title(&result), "Análise da leitura");
        assert_eq!(
            MetricsStrategy::description(&result),
            "Sem métricas suficientes para gerar um resumo detalhado."
        );
    }

    #[test]
    fn test_description_quotes_at_most_three_points() {
        let mut result = result_with(Some(70.0), 0);
        result.improvement_points = vec!["a".into(), " ".into(), "b".into(), "c".into(), "d".into()];

        assert!(MetricsStrategy::description(&result).ends_with("Pontos de melhoria: a, b, c."));
    }
}
