//! Assessment pipeline: analyze, store, classify

use chrono::Utc;
use fluency_engine::{analyze_reading, AssessmentResult};
use fluency_insights::{GeminiClient, GenerativeClient, InsightClassifier, InsightContext};
use fluency_store::{AssessmentRecord, AssessmentStore, Attempt, Insight};
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::FluencyConfig;
use crate::error::{AssessmentError, Result};
use crate::view::AttemptMetrics;

/// Diagnostics quoted in the generative context
const RECENT_DIAGNOSTICS_LIMIT: usize = 3;

/// Why an attempt was not assessed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NoTranscript,
    PassageUnavailable,
}

/// What `assess_attempt` did
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AssessmentOutcome {
    Assessed {
        record: AssessmentRecord,
        insight: Option<Insight>,
    },
    Skipped {
        attempt_id: Uuid,
        reason: SkipReason,
    },
}

impl AssessmentOutcome {
    pub fn record(&self) -> Option<&AssessmentRecord> {
        match self {
            AssessmentOutcome::Assessed { record, .. } => Some(record),
            AssessmentOutcome::Skipped { .. } => None,
        }
    }

    pub fn insight(&self) -> Option<&Insight> {
        match self {
            AssessmentOutcome::Assessed { insight, .. } => insight.as_ref(),
            AssessmentOutcome::Skipped { .. } => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, AssessmentOutcome::Skipped { .. })
    }
}

/// Parse an externally supplied attempt id
pub fn parse_attempt_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| AssessmentError::InvalidAttemptId(raw.to_string()))
}

/// Orchestrates analysis, record upsert and insight creation
pub struct AssessmentService {
    store: Arc<AssessmentStore>,
    classifier: InsightClassifier,
    recent_attempts_limit: usize,
}

impl AssessmentService {
    pub fn new(store: Arc<AssessmentStore>, classifier: InsightClassifier) -> Self {
        Self {
            store,
            classifier,
            recent_attempts_limit: 5,
        }
    }

    pub fn with_recent_attempts_limit(mut self, limit: usize) -> Self {
        self.recent_attempts_limit = limit;
        self
    }

    /// Build the service described by `config`.
    ///
    /// The generative client is created here, once, and shared by every
    /// assessment. Without a usable key only the metric rules run.
    pub fn from_config(config: &FluencyConfig) -> anyhow::Result<Self> {
        let store = Arc::new(AssessmentStore::new(&config.database_path)?);

        let classifier = match config.generative.client_settings() {
            Some(settings) => {
                let model = settings.model.clone();
                let client: Arc<dyn GenerativeClient> = Arc::new(GeminiClient::new(settings)?);
                info!(model = %model, "Generative insights enabled");
                InsightClassifier::with_generative(client, config.generative.timeout())
            }
            None => {
                info!("Generative insights disabled, using metric rules only");
                InsightClassifier::metrics_only()
            }
        };

        Ok(Self::new(store, classifier).with_recent_attempts_limit(config.recent_attempts_limit))
    }

    pub fn store(&self) -> &AssessmentStore {
        &self.store
    }

    /// Assess one attempt end to end.
    ///
    /// Malformed or unknown ids are errors. An attempt without transcript or
    /// without passage text is skipped and nothing is written.
    pub async fn assess_attempt(&self, attempt_id: &str) -> Result<AssessmentOutcome> {
        let attempt_id = parse_attempt_id(attempt_id)?;
        let attempt = self
            .store
            .get_attempt(attempt_id)?
            .ok_or(AssessmentError::AttemptNotFound(attempt_id))?;

        let Some(transcript) = attempt.transcript.as_deref().filter(|_| attempt.has_transcript())
        else {
            info!(attempt_id = %attempt_id, "Skipping assessment: no transcript");
            return Ok(AssessmentOutcome::Skipped {
                attempt_id,
                reason: SkipReason::NoTranscript,
            });
        };

        let passage = self
            .store
            .get_passage(attempt.passage_id)?
            .filter(|p| !p.content.trim().is_empty());
        let Some(passage) = passage else {
            info!(attempt_id = %attempt_id, passage_id = %attempt.passage_id, "Skipping assessment: passage text unavailable");
            return Ok(AssessmentOutcome::Skipped {
                attempt_id,
                reason: SkipReason::PassageUnavailable,
            });
        };

        let result = analyze_reading(transcript, &passage.content, attempt.duration_seconds);
        let record = AssessmentRecord::from_result(attempt_id, &result);
        self.store.upsert_assessment(&record)?;

        info!(
            attempt_id = %attempt_id,
            accuracy = ?record.accuracy_score,
            errors = record.error_count(),
            "Attempt assessed"
        );

        let insight = match self.create_insight(&attempt, &result).await {
            Ok(insight) => insight,
            Err(e) => {
                warn!(attempt_id = %attempt_id, "Failed to create insight: {:#}", e);
                None
            }
        };

        Ok(AssessmentOutcome::Assessed { record, insight })
    }

    /// Assess several attempts concurrently; one result per id, in order.
    pub async fn assess_many<S: AsRef<str>>(&self, attempt_ids: &[S]) -> Vec<Result<AssessmentOutcome>> {
        join_all(
            attempt_ids
                .iter()
                .map(|id| self.assess_attempt(id.as_ref())),
        )
        .await
    }

    async fn create_insight(
        &self,
        attempt: &Attempt,
        result: &AssessmentResult,
    ) -> anyhow::Result<Option<Insight>> {
        let Some(student) = self.store.get_student(attempt.student_id)? else {
            warn!(attempt_id = %attempt.id, student_id = %attempt.student_id, "Student not found, no insight");
            return Ok(None);
        };

        let Some(owner_id) = attempt.created_by.or(student.professional_id) else {
            info!(attempt_id = %attempt.id, "No owning professional, no insight");
            return Ok(None);
        };

        let history =
            self.store
                .recent_attempts(student.id, self.recent_attempts_limit, Some(attempt.id))?;
        let diagnostics = self
            .store
            .recent_diagnostics(student.id, RECENT_DIAGNOSTICS_LIMIT)?;
        let student_id = student.id;
        let context = InsightContext {
            student,
            attempt: attempt.clone(),
            history,
            diagnostics,
        };

        let Some(draft) = self.classifier.classify(result, &context).await else {
            return Ok(None);
        };

        let insight = Insight {
            id: Uuid::new_v4(),
            owner_id: Some(owner_id),
            category: draft.category,
            priority: draft.priority,
            title: draft.title,
            description: draft.description,
            related_students: vec![student_id],
            source: draft.source,
            is_read: false,
            created_at: Utc::now(),
            expires_at: None,
        };
        self.store.insert_insight(&insight)?;

        Ok(Some(insight))
    }

    /// Display-ready metrics of one attempt, with fallbacks when it has not
    /// been assessed yet.
    pub fn attempt_metrics(&self, attempt_id: &str) -> Result<AttemptMetrics> {
        let attempt_id = parse_attempt_id(attempt_id)?;
        let attempt = self
            .store
            .get_attempt(attempt_id)?
            .ok_or(AssessmentError::AttemptNotFound(attempt_id))?;

        let record = self.store.get_assessment(attempt_id)?;
        let insights = self.store.insights_for_student(attempt.student_id)?;

        Ok(AttemptMetrics::build(&attempt, record.as_ref(), insights))
    }

    /// Insight history of a student, newest first
    pub fn student_insights(&self, student_id: &str) -> Result<Vec<Insight>> {
        let student_id = Uuid::parse_str(student_id.trim())
            .map_err(|_| AssessmentError::InvalidStudentId(student_id.to_string()))?;
        Ok(self.store.insights_for_student(student_id)?)
    }
}
