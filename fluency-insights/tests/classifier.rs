//! Strategy ordering and fallback behaviour

use async_trait::async_trait;
use chrono::Utc;
use fluency_engine::analyze_reading;
use fluency_insights::{
    GenerativeClient, InsightClassifier, InsightContext, InsightError, Result,
};
use fluency_store::{Attempt, InsightCategory, InsightPriority, InsightSource, Student};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

enum Behaviour {
    Answer(&'static str),
    Fail,
    Hang,
}

struct FakeClient {
    behaviour: Behaviour,
    calls: AtomicUsize,
}

impl FakeClient {
    fn new(behaviour: Behaviour) -> Arc<Self> {
        Arc::new(Self {
            behaviour,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl GenerativeClient for FakeClient {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.behaviour {
            Behaviour::Answer(text) => Ok(text.to_string()),
            Behaviour::Fail => Err(InsightError::network("connection refused")),
            Behaviour::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(String::new())
            }
        }
    }
}

fn context(transcript: Option<&str>) -> InsightContext {
    let student_id = Uuid::new_v4();
    InsightContext {
        student: Student {
            id: student_id,
            name: "Davi".to_string(),
            age: Some(7),
            observations: None,
            professional_id: Some(Uuid::new_v4()),
        },
        attempt: Attempt {
            id: Uuid::new_v4(),
            student_id,
            passage_id: Uuid::new_v4(),
            duration_seconds: Some(3.0),
            transcript: transcript.map(str::to_string),
            created_by: None,
            recorded_at: Utc::now(),
        },
        history: Vec::new(),
        diagnostics: Vec::new(),
    }
}

#[tokio::test]
async fn test_perfect_reading_falls_back_to_progress() {
    let classifier = InsightClassifier::metrics_only();
    let result = analyze_reading("o gato subiu no telhado", "o gato subiu no telhado", Some(3.0));

    let draft = classifier
        .classify(&result, &context(Some("o gato subiu no telhado")))
        .await
        .unwrap();

    assert_eq!(draft.category, InsightCategory::Progress);
    assert_eq!(draft.priority, InsightPriority::Low);
    assert_eq!(draft.title, "Acurácia 100% · PPM 100");
    assert_eq!(draft.source, InsightSource::Metrics);
}

#[tokio::test]
async fn test_partial_reading_is_a_suggestion() {
    let classifier = InsightClassifier::metrics_only();
    let result = analyze_reading("a menina andou", "a menina correu rápido", Some(2.0));

    let draft = classifier
        .classify(&result, &context(Some("a menina andou")))
        .await
        .unwrap();

    assert_eq!(draft.category, InsightCategory::Suggestion);
    assert_eq!(draft.priority, InsightPriority::Medium);
}

#[tokio::test]
async fn test_generative_answer_wins() {
    let client = FakeClient::new(Behaviour::Answer(
        "```json\n{\"type\": \"progress\", \"priority\": \"low\", \
         \"title\": \"Leitura segura\", \"description\": \"Manter a rotina.\"}\n```",
    ));
    let classifier = InsightClassifier::with_generative(client.clone(), Duration::from_secs(1));
    let result = analyze_reading("a menina andou", "a menina correu rápido", Some(2.0));

    let draft = classifier
        .classify(&result, &context(Some("a menina andou")))
        .await
        .unwrap();

    assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    assert_eq!(draft.source, InsightSource::Generative);
    assert_eq!(draft.category, InsightCategory::Progress);
    assert_eq!(draft.title, "Leitura segura");
}

#[tokio::test]
async fn test_generative_failure_falls_back() {
    for behaviour in [
        Behaviour::Fail,
        Behaviour::Answer("não consegui analisar"),
        Behaviour::Answer("{\"title\": \"\", \"description\": \"x\"}"),
    ] {
        let classifier =
            InsightClassifier::with_generative(FakeClient::new(behaviour), Duration::from_secs(1));
        let result = analyze_reading("a menina andou", "a menina correu rápido", Some(2.0));

        let draft = classifier
            .classify(&result, &context(Some("a menina andou")))
            .await
            .unwrap();

        assert_eq!(draft.source, InsightSource::Metrics);
        assert_eq!(draft.category, InsightCategory::Suggestion);
    }
}

#[tokio::test]
async fn test_generative_timeout_falls_back() {
    let classifier = InsightClassifier::with_generative(
        FakeClient::new(Behaviour::Hang),
        Duration::from_millis(50),
    );
    let result = analyze_reading("o gato", "o gato subiu no telhado", Some(3.0));

    let draft = classifier
        .classify(&result, &context(Some("o gato")))
        .await
        .unwrap();

    assert_eq!(draft.source, InsightSource::Metrics);
}

#[tokio::test]
async fn test_no_transcript_yields_nothing() {
    let client = FakeClient::new(Behaviour::Fail);
    let classifier = InsightClassifier::with_generative(client.clone(), Duration::from_secs(1));
    let result = analyze_reading("", "o gato subiu no telhado", Some(3.0));

    assert!(classifier.classify(&result, &context(None)).await.is_none());
    assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    assert_eq!(classifier.strategy_names(), vec!["generative", "metrics"]);
}
