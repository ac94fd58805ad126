//! Google Generative Language REST client

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::error::{InsightError, Result};
use crate::generative::{GenerativeClient, DEFAULT_TIMEOUT};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// Header carrying the API key, kept out of the URL
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Connection settings for [`GeminiClient`]
#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl GeminiSettings {
    pub fn new<S: Into<String>>(api_key: S) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[derive(Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate
    fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|part| part.text.as_deref())
            .collect();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

/// HTTP client for `models/{model}:generateContent`
pub struct GeminiClient {
    http_client: reqwest::Client,
    settings: GeminiSettings,
}

impl GeminiClient {
    pub fn new(settings: GeminiSettings) -> Result<Self> {
        if settings.api_key.trim().is_empty() {
            return Err(InsightError::MissingApiKey);
        }

        let http_client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(InsightError::from)?;

        Ok(Self {
            http_client,
            settings,
        })
    }

    pub fn model(&self) -> &str {
        &self.settings.model
    }

    fn endpoint(&self) -> String {
        let model = self
            .settings
            .model
            .strip_prefix("models/")
            .unwrap_or(&self.settings.model);
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.settings.base_url.trim_end_matches('/'),
            model
        )
    }
}

#[async_trait]
impl GenerativeClient for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = GenerateContentRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: prompt }],
            }],
        };

        debug!(model = %self.settings.model, prompt_chars = prompt.len(), "Requesting generative insight");

        let response = self
            .http_client
            .post(self.endpoint())
            .header(API_KEY_HEADER, self.settings.api_key.as_str())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(InsightError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: GenerateContentResponse = response.json().await?;

        parsed.text().ok_or(InsightError::EmptyResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings_for(server: &MockServer) -> GeminiSettings {
        GeminiSettings {
            base_url: server.uri(),
            ..GeminiSettings::new("test-key")
        }
    }

    #[test]
    fn test_missing_api_key_rejected() {
        let result = GeminiClient::new(GeminiSettings::new("  "));
        assert!(matches!(result, Err(InsightError::MissingApiKey)));
    }

    #[test]
    fn test_endpoint_strips_models_prefix() {
        let mut settings = GeminiSettings::new("k");
        settings.model = "models/gemini-1.5-pro".to_string();
        settings.base_url = "http://localhost:9/".to_string();
        let client = GeminiClient::new(settings).unwrap();

        assert_eq!(
            client.endpoint(),
            "http://localhost:9/v1beta/models/gemini-1.5-pro:generateContent"
        );
    }

    #[tokio::test]
    async fn test_generate_returns_candidate_text() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-1.5-flash:generateContent"))
            .and(header("x-goog-api-key", "test-key"))
            .and(body_partial_json(json!({
                "contents": [{"parts": [{"text": "olá"}]}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": {"parts": [{"text": "{\"title\": "}, {"text": "\"x\"}"}]}
                }]
            })))
            .mount(&server)
            .await;

        let client = GeminiClient::new(settings_for(&server)).unwrap();
        let text = client.generate("olá").await.unwrap();

        assert_eq!(text, "{\"title\": \"x\"}");
    }

    #[tokio::test]
    async fn test_transport_error_does_not_expose_api_key() {
        let settings = GeminiSettings {
            base_url: "http://127.0.0.1:1".to_string(),
            ..GeminiSettings::new("SECRET-KEY-123")
        };
        let client = GeminiClient::new(settings).unwrap();

        let err = client.generate("olá").await.unwrap_err();
        let logged = format!("Generative insight failed: {}", err);

        assert!(matches!(err, InsightError::Network(_)));
        assert!(!logged.contains("SECRET-KEY-123"), "{}", logged);
        assert!(!format!("{:?}", err).contains("SECRET-KEY-123"));
    }

    #[tokio::test]
    async fn test_malformed_body_does_not_expose_api_key() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = GeminiClient::new(GeminiSettings {
            base_url: server.uri(),
            ..GeminiSettings::new("SECRET-KEY-123")
        })
        .unwrap();
        let err = client.generate("olá").await.unwrap_err();

        assert!(matches!(err, InsightError::Parse(_)));
        assert!(!err.to_string().contains("SECRET-KEY-123"));
    }

    #[tokio::test]
    async fn test_generate_maps_error_status() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("quota"))
            .mount(&server)
            .await;

        let client = GeminiClient::new(settings_for(&server)).unwrap();
        let err = client.generate("olá").await.unwrap_err();

        assert!(matches!(err, InsightError::Api { status: 429, .. }));
    }

    #[tokio::test]
    async fn test_generate_without_candidates_is_empty() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"candidates": []})))
            .mount(&server)
            .await;

        let client = GeminiClient::new(settings_for(&server)).unwrap();
        let err = client.generate("olá").await.unwrap_err();

        assert!(matches!(err, InsightError::EmptyResponse));
    }
}
