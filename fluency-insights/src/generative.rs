//! Generative insight strategy
//!
//! Builds a pedagogical prompt from the student's context, asks an external
//! text generation service for a JSON insight and normalizes the answer.
//! Any failure (transport, timeout, unparseable text) yields `None`.

use async_trait::async_trait;
use fluency_engine::AssessmentResult;
use fluency_store::{
    AttemptHistoryEntry, Diagnostic, InsightCategory, InsightPriority, InsightSource,
};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{InsightError, Result};
use crate::strategy::{InsightContext, InsightDraft, InsightStrategy};

/// Default bound on one generative call
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

const NO_METRICS: &str = "Sem métricas disponíveis";
const UNKNOWN: &str = "não informada";

static FENCED_OBJECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").expect("fenced block pattern is valid")
});

/// Handle to a text generation service.
///
/// Created once per process and shared as `Arc<dyn GenerativeClient>`.
#[async_trait]
pub trait GenerativeClient: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Metrics block as shown to the service
pub fn format_metrics(result: Option<&AssessmentResult>) -> String {
    let Some(result) = result else {
        return NO_METRICS.to_string();
    };

    let mut details = Vec::new();
    if let Some(accuracy) = result.accuracy_score {
        details.push(format!("Acurácia: {:.1}%", accuracy));
    }
    if !result.errors.is_empty() {
        details.push(format!("Erros detectados: {}", result.error_count()));
    }
    details.push(format!("Palavras totais: {}", result.total_words));
    details.push(format!("Palavras corretas: {}", result.correct_words));
    if let Some(wpm) = result.words_per_minute {
        details.push(format!("Palavras por minuto: {:.1}", wpm));
    }
    if let Some(fluency) = result.fluency_score {
        details.push(format!("Fluência: {:.1}", fluency));
    }
    if let Some(prosody) = result.prosody_score {
        details.push(format!("Prosódia: {:.1}", prosody));
    }
    if !result.improvement_points.is_empty() {
        let points: Vec<&str> = result
            .improvement_points
            .iter()
            .take(3)
            .map(String::as_str)
            .collect();
        details.push(format!("Pontos de melhoria: {}", points.join(", ")));
    }

    details.join("\n")
}

/// Previous attempts, one block each
pub fn format_history(history: &[AttemptHistoryEntry]) -> String {
    history
        .iter()
        .map(|entry| {
            let title = entry.passage_title.as_deref().unwrap_or("Leitura");
            let metrics = entry.assessment.as_ref().map(|record| record.to_result());
            let transcript = entry.attempt.transcript.as_deref().unwrap_or("").trim();
            format!(
                "Título: {}\nData: {}\nDados técnicos:\n{}\nTranscrição:\n{}",
                title,
                entry.attempt.recorded_at.format("%Y-%m-%d %H:%M"),
                format_metrics(metrics.as_ref()),
                transcript
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Recent diagnostics, one block each; optional lines are left out when empty
pub fn format_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|diagnostic| {
            let mut lines = vec![
                format!("Tipo: {}", diagnostic.kind),
                format!("Data: {}", diagnostic.created_at.format("%Y-%m-%d %H:%M")),
            ];
            if let Some(score) = diagnostic.overall_score {
                lines.push(format!("Pontuação: {:.1}", score));
            }
            if let Some(level) = diagnostic.reading_level.as_deref().filter(|l| !l.is_empty()) {
                lines.push(format!("Nível de leitura: {}", level));
            }
            if !diagnostic.strengths.is_empty() {
                lines.push(format!("Pontos fortes: {}", diagnostic.strengths.join(", ")));
            }
            if !diagnostic.difficulties.is_empty() {
                lines.push(format!("Dificuldades: {}", diagnostic.difficulties.join(", ")));
            }
            if let Some(text) = diagnostic.recommendations.as_deref().map(str::trim) {
                if !text.is_empty() {
                    lines.push(format!("Recomendações: {}", text));
                }
            }
            lines.join("\n")
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Full prompt for one attempt
pub fn build_prompt(result: &AssessmentResult, context: &InsightContext) -> String {
    let student = &context.student;
    let attempt = &context.attempt;

    let mut sections = Vec::new();
    if let Some(notes) = student.observations.as_deref().map(str::trim) {
        if !notes.is_empty() {
            sections.push(format!("Observações do professor:\n{}", notes));
        }
    }
    if !context.diagnostics.is_empty() {
        sections.push(format!(
            "Diagnósticos recentes:\n{}",
            format_diagnostics(&context.diagnostics)
        ));
    }
    if !context.history.is_empty() {
        sections.push(format!(
            "Leituras anteriores:\n{}",
            format_history(&context.history)
        ));
    }
    sections.push(format!(
        "Métricas da leitura atual:\n{}",
        format_metrics(Some(result))
    ));
    let context_summary = sections.join("\n\n");

    let age = student
        .age
        .map(|age| age.to_string())
        .unwrap_or_else(|| UNKNOWN.to_string());
    let duration = attempt
        .duration_seconds
        .map(|d| format!("{:.1} segundos", d))
        .unwrap_or_else(|| UNKNOWN.to_string());

    format!(
        "Você é um especialista em alfabetização auxiliando um profissional da educação. \
         Avalie a nova gravação do aluno com base no contexto e produza um insight pedagógico útil. \
         Mantenha um tom encorajador e prático.\n\n\
         Aluno: {name} (idade: {age})\n\
         Nova gravação:\n\
         - Texto ID: {passage}\n\
         - Data/hora: {recorded}\n\
         - Duração: {duration}\n\
         - Transcrição completa:\n{transcript}\n\n\
         Contexto adicional:\n{context_summary}\n\n\
         Responda exclusivamente em JSON com os campos obrigatórios:\n\
         {{\"type\": \"progress|attention_needed|suggestion\", \
         \"priority\": \"low|medium|high\", \
         \"title\": \"frase curta\", \
         \"description\": \"parágrafo breve com orientação prática\"}}\n\
         Não inclua texto fora do JSON.",
        name = student.name,
        age = age,
        passage = attempt.passage_id,
        recorded = attempt.recorded_at.format("%Y-%m-%d %H:%M"),
        duration = duration,
        transcript = attempt.transcript.as_deref().unwrap_or("").trim(),
        context_summary = context_summary,
    )
}

/// JSON object in the service's answer.
///
/// A fenced code block wins over the surrounding text; anything that is not a
/// JSON object yields `None`.
pub fn extract_json_payload(raw: &str) -> Option<Map<String, Value>> {
    let mut content = raw.trim();
    if content.contains("```") {
        if let Some(captures) = FENCED_OBJECT.captures(content) {
            if let Some(object) = captures.get(1) {
                content = object.as_str();
            }
        }
    }

    match serde_json::from_str::<Value>(content) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

fn field_text(payload: &Map<String, Value>, key: &str) -> Option<String> {
    match payload.get(key)? {
        Value::Null => None,
        Value::String(s) => Some(s.trim().to_string()),
        other => Some(other.to_string()),
    }
}

/// Draft from a decoded payload; `None` unless title and description are set.
pub fn normalize_payload(payload: &Map<String, Value>) -> Option<InsightDraft> {
    let title = field_text(payload, "title").filter(|t| !t.is_empty())?;
    let description = field_text(payload, "description").filter(|d| !d.is_empty())?;

    let category = field_text(payload, "type")
        .and_then(|raw| raw.parse::<InsightCategory>().ok())
        .unwrap_or(InsightCategory::Suggestion);
    let priority = field_text(payload, "priority")
        .and_then(|raw| raw.parse::<InsightPriority>().ok())
        .unwrap_or(InsightPriority::Medium);

    Some(InsightDraft {
        category,
        priority,
        title,
        description,
        source: InsightSource::Generative,
    })
}

/// Asks the generative service first; silent on every failure
pub struct GenerativeStrategy {
    client: Arc<dyn GenerativeClient>,
    timeout: Duration,
}

impl GenerativeStrategy {
    pub fn new(client: Arc<dyn GenerativeClient>) -> Self {
        Self {
            client,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn request(&self, prompt: &str) -> Result<String> {
        tokio::time::timeout(self.timeout, self.client.generate(prompt))
            .await
            .map_err(|_| InsightError::Timeout(self.timeout))?
    }
}

#[async_trait]
impl InsightStrategy for GenerativeStrategy {
    fn name(&self) -> &'static str {
        "generative"
    }

    async fn propose(
        &self,
        result: &AssessmentResult,
        context: &InsightContext,
    ) -> Option<InsightDraft> {
        if !context.attempt.has_transcript() {
            return None;
        }

        let prompt = build_prompt(result, context);
        let answer = match self.request(&prompt).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!(attempt_id = %context.attempt.id, "Generative insight failed: {}", e);
                return None;
            }
        };

        let draft = extract_json_payload(&answer).and_then(|payload| normalize_payload(&payload));
        if draft.is_none() {
            debug!(attempt_id = %context.attempt.id, "Generative answer was not a usable insight");
        }
        draft
    }
}
