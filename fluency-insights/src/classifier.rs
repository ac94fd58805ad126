//! Ordered strategy chain

use fluency_engine::AssessmentResult;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::generative::{GenerativeClient, GenerativeStrategy};
use crate::strategy::{InsightContext, InsightDraft, InsightStrategy, MetricsStrategy};

/// Runs strategies in order and keeps the first draft produced
pub struct InsightClassifier {
    strategies: Vec<Box<dyn InsightStrategy>>,
}

impl InsightClassifier {
    pub fn new(strategies: Vec<Box<dyn InsightStrategy>>) -> Self {
        Self { strategies }
    }

    /// Deterministic classification only
    pub fn metrics_only() -> Self {
        Self::new(vec![Box::new(MetricsStrategy::new())])
    }

    /// Generative service first, metric-driven fallback second
    pub fn with_generative(client: Arc<dyn GenerativeClient>, timeout: Duration) -> Self {
        Self::new(vec![
            Box::new(GenerativeStrategy::new(client).with_timeout(timeout)),
            Box::new(MetricsStrategy::new()),
        ])
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Classify one assessed attempt.
    ///
    /// `None` only when the attempt has no transcript (or every strategy
    /// declined, which cannot happen with the metric fallback in place).
    pub async fn classify(
        &self,
        result: &AssessmentResult,
        context: &InsightContext,
    ) -> Option<InsightDraft> {
        if !context.attempt.has_transcript() {
            return None;
        }

        for strategy in &self.strategies {
            if let Some(draft) = strategy.propose(result, context).await {
                debug!(
                    attempt_id = %context.attempt.id,
                    strategy = strategy.name(),
                    category = %draft.category,
                    "Insight classified"
                );
                return Some(draft);
            }
        }

        None
    }
}
