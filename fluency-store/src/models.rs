//! Records persisted by the assessment store

use chrono::{DateTime, Utc};
use fluency_engine::{AssessmentResult, ReadingError};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// A passage students are asked to read aloud
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub id: Uuid,
    pub title: String,
    /// Reference text; may be empty for passages still being authored
    pub content: String,
}

/// Student profile, as far as insight generation needs it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: Uuid,
    pub name: String,
    pub age: Option<i32>,
    /// Free-text teacher notes
    pub observations: Option<String>,
    /// Professional who owns the student's insights by default
    pub professional_id: Option<Uuid>,
}

/// One recorded reading of a passage by a student
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    pub id: Uuid,
    pub student_id: Uuid,
    pub passage_id: Uuid,
    pub duration_seconds: Option<f64>,
    /// Speech-to-text output; `None` until transcription has run
    pub transcript: Option<String>,
    pub created_by: Option<Uuid>,
    pub recorded_at: DateTime<Utc>,
}

impl Attempt {
    /// True when there is a transcript with at least one non-blank character.
    pub fn has_transcript(&self) -> bool {
        self.transcript
            .as_deref()
            .is_some_and(|text| !text.trim().is_empty())
    }
}

/// Structured recommendation payload stored next to the metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recommendations {
    pub focus: Vec<String>,
}

/// The single live assessment of an attempt (overwritten on re-analysis)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentRecord {
    pub attempt_id: Uuid,
    pub total_words: i64,
    pub correct_words: i64,
    pub words_per_minute: Option<f64>,
    pub accuracy_score: Option<f64>,
    pub fluency_score: Option<f64>,
    pub prosody_score: Option<f64>,
    pub overall_score: Option<f64>,
    pub errors: Vec<ReadingError>,
    pub improvement_points: Vec<String>,
    pub summary: Option<String>,
    pub recommendations: Recommendations,
    pub processed_at: DateTime<Utc>,
}

impl AssessmentRecord {
    /// Build the persisted form of a freshly computed result.
    pub fn from_result(attempt_id: Uuid, result: &AssessmentResult) -> Self {
        let summary = result
            .accuracy_score
            .map(|accuracy| format!("Acurácia estimada em {:.1}%.", accuracy));

        Self {
            attempt_id,
            total_words: result.total_words as i64,
            correct_words: result.correct_words as i64,
            words_per_minute: result.words_per_minute,
            accuracy_score: result.accuracy_score,
            fluency_score: result.fluency_score,
            prosody_score: result.prosody_score,
            overall_score: result.overall_score,
            errors: result.errors.clone(),
            improvement_points: result.improvement_points.clone(),
            summary,
            recommendations: Recommendations {
                focus: result.improvement_points.clone(),
            },
            processed_at: Utc::now(),
        }
    }

    /// Back to the engine's result shape (used by insight classification).
    pub fn to_result(&self) -> AssessmentResult {
        AssessmentResult {
            total_words: self.total_words.max(0) as usize,
            correct_words: self.correct_words.max(0) as usize,
            words_per_minute: self.words_per_minute,
            accuracy_score: self.accuracy_score,
            fluency_score: self.fluency_score,
            prosody_score: self.prosody_score,
            overall_score: self.overall_score,
            errors: self.errors.clone(),
            improvement_points: self.improvement_points.clone(),
        }
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }
}

/// Returned when a stored enum column holds an unknown value
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// What an insight is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightCategory {
    Progress,
    AttentionNeeded,
    Suggestion,
}

impl InsightCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            InsightCategory::Progress => "progress",
            InsightCategory::AttentionNeeded => "attention_needed",
            InsightCategory::Suggestion => "suggestion",
        }
    }
}

impl std::fmt::Display for InsightCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InsightCategory {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "progress" => Ok(InsightCategory::Progress),
            "attention_needed" => Ok(InsightCategory::AttentionNeeded),
            "suggestion" => Ok(InsightCategory::Suggestion),
            other => Err(UnknownVariant {
                kind: "insight category",
                value: other.to_string(),
            }),
        }
    }
}

/// How urgently an insight should be surfaced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightPriority {
    Low,
    Medium,
    High,
}

impl InsightPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            InsightPriority::Low => "low",
            InsightPriority::Medium => "medium",
            InsightPriority::High => "high",
        }
    }
}

impl std::fmt::Display for InsightPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InsightPriority {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(InsightPriority::Low),
            "medium" => Ok(InsightPriority::Medium),
            "high" => Ok(InsightPriority::High),
            other => Err(UnknownVariant {
                kind: "insight priority",
                value: other.to_string(),
            }),
        }
    }
}

/// Which strategy produced an insight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightSource {
    Generative,
    Metrics,
}

impl InsightSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            InsightSource::Generative => "generative",
            InsightSource::Metrics => "metrics",
        }
    }
}

impl FromStr for InsightSource {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "generative" => Ok(InsightSource::Generative),
            "metrics" => Ok(InsightSource::Metrics),
            other => Err(UnknownVariant {
                kind: "insight source",
                value: other.to_string(),
            }),
        }
    }
}

/// Stage of the school year a diagnostic was conducted at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticKind {
    Initial,
    Ongoing,
    Final,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::Initial => "initial",
            DiagnosticKind::Ongoing => "ongoing",
            DiagnosticKind::Final => "final",
        }
    }
}

impl std::fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiagnosticKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initial" => Ok(DiagnosticKind::Initial),
            "ongoing" => Ok(DiagnosticKind::Ongoing),
            "final" => Ok(DiagnosticKind::Final),
            other => Err(UnknownVariant {
                kind: "diagnostic kind",
                value: other.to_string(),
            }),
        }
    }
}

/// A professional's diagnostic of a student (collaborator data, read-only here)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub id: Uuid,
    pub student_id: Uuid,
    pub kind: DiagnosticKind,
    pub overall_score: Option<f64>,
    pub reading_level: Option<String>,
    pub strengths: Vec<String>,
    pub difficulties: Vec<String>,
    pub recommendations: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A pedagogical observation; every qualifying assessment adds a new one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub id: Uuid,
    pub owner_id: Option<Uuid>,
    pub category: InsightCategory,
    pub priority: InsightPriority,
    pub title: String,
    pub description: String,
    pub related_students: Vec<Uuid>,
    pub source: InsightSource,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use fluency_engine::analyze_reading;

    #[test]
    fn test_record_summary_and_recommendations() {
        let result = analyze_reading("a menina andou", "a menina correu rápido", Some(2.0));
        let record = AssessmentRecord::from_result(Uuid::new_v4(), &result);

        assert_eq!(record.summary.as_deref(), Some("Acurácia estimada em 66.7%."));
        assert_eq!(record.recommendations.focus, result.improvement_points);
        assert_eq!(record.to_result(), result);
    }

    #[test]
    fn test_record_without_accuracy_has_no_summary() {
        let result = analyze_reading("", "texto de referência", Some(2.0));
        let record = AssessmentRecord::from_result(Uuid::new_v4(), &result);

        assert_eq!(record.summary, None);
        assert_eq!(record.error_count(), 3);
    }

    #[test]
    fn test_enum_string_round_trip() {
        for category in [
            InsightCategory::Progress,
            InsightCategory::AttentionNeeded,
            InsightCategory::Suggestion,
        ] {
            assert_eq!(category.as_str().parse::<InsightCategory>(), Ok(category));
        }
        assert!("urgent".parse::<InsightPriority>().is_err());
        assert_eq!("ongoing".parse::<DiagnosticKind>(), Ok(DiagnosticKind::Ongoing));
        assert_eq!(
            serde_json::to_string(&InsightCategory::AttentionNeeded).unwrap(),
            "\"attention_needed\""
        );
    }

    #[test]
    fn test_blank_transcript_is_missing() {
        let mut attempt = Attempt {
            id: Uuid::new_v4(),
            student_id: Uuid::new_v4(),
            passage_id: Uuid::new_v4(),
            duration_seconds: None,
            transcript: Some("  \n".to_string()),
            created_by: None,
            recorded_at: Utc::now(),
        };
        assert!(!attempt.has_transcript());

        attempt.transcript = Some("era uma vez".to_string());
        assert!(attempt.has_transcript());
    }
}
