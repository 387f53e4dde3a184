use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, instrument};

use crate::config::GeminiConfig;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Failed to reach the generation service: {0}")]
    Transport(reqwest::Error),

    #[error("Generation service returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Prompt was blocked by the generation service: {0}")]
    Blocked(String),

    #[error("Generation service returned malformed JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Generation service returned no text: {0}")]
    EmptyResponse(String),

    #[error("Invalid generation endpoint: {0}")]
    Endpoint(String),
}

// The request URL never carries the key, but strip it anyway before the
// error reaches logs or the error page.
impl From<reqwest::Error> for GenerationError {
    fn from(e: reqwest::Error) -> Self {
        GenerationError::Transport(e.without_url())
    }
}

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Anything that turns a prompt into a completion.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

// Structures matching Gemini's models/{model}:generateContent endpoint
#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: [RequestPart<'a>; 1],
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Deserialize, Debug)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(rename = "promptFeedback")]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: Option<CandidateContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize, Debug)]
struct PromptFeedback {
    #[serde(rename = "blockReason")]
    block_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ErrorEnvelope {
    error: Option<ApiErrorBody>,
}

#[derive(Deserialize, Debug)]
struct ApiErrorBody {
    message: Option<String>,
    status: Option<String>,
}

/// Client for the hosted Gemini text-generation API.
#[derive(Clone)]
pub struct GeminiClient {
    http: Client,
    endpoint: Url,
    api_key: String,
}

impl GeminiClient {
    pub fn new(config: &GeminiConfig) -> Result<Self, GenerationError> {
        let model_path = if config.model.starts_with("models/") {
            config.model.clone()
        } else {
            format!("models/{}", config.model)
        };
        let endpoint = format!(
            "{}/{}:generateContent",
            config.base_url.trim_end_matches('/'),
            model_path
        );
        let endpoint =
            Url::parse(&endpoint).map_err(|e| GenerationError::Endpoint(format!("{endpoint}: {e}")))?;

        Ok(Self {
            http: Client::new(),
            endpoint,
            api_key: config.api_key.clone(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    #[instrument(skip_all, fields(endpoint = %self.endpoint, prompt_len = prompt.len()))]
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        debug!(?prompt, "Sending prompt to Gemini");

        let body = GenerateRequest {
            contents: [Content {
                role: "user",
                parts: [RequestPart { text: prompt }],
            }],
        };

        let response = self
            .http
            .post(self.endpoint.clone())
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            let message = extract_api_error(&error_body);
            error!(%status, %message, "Gemini API request failed");
            return Err(GenerationError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let payload = response.text().await?;
        let parsed: GenerateResponse = serde_json::from_str(&payload)?;
        let text = completion_text(parsed)?;
        debug!(response = ?text, "Received Gemini response");
        Ok(text)
    }
}

// Concatenate the text parts of the first candidate.
fn completion_text(response: GenerateResponse) -> Result<String, GenerationError> {
    if let Some(reason) = response
        .prompt_feedback
        .and_then(|feedback| feedback.block_reason)
    {
        return Err(GenerationError::Blocked(reason));
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| GenerationError::EmptyResponse("no candidates".to_string()))?;

    let text: String = candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect()
        })
        .unwrap_or_default();

    if text.is_empty() {
        let reason = candidate
            .finish_reason
            .unwrap_or_else(|| "unknown".to_string());
        return Err(GenerationError::EmptyResponse(format!(
            "finish reason {reason}"
        )));
    }
    Ok(text)
}

fn extract_api_error(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(ErrorEnvelope {
            error: Some(ApiErrorBody { message, status }),
        }) => {
            let message = message.unwrap_or_else(|| "unknown error".to_string());
            match status {
                Some(status) => format!("{message} ({status})"),
                None => message,
            }
        }
        _ => body.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> GeminiConfig {
        GeminiConfig {
            api_key: "test-key".to_string(),
            model: "gemini-pro".to_string(),
            base_url: server.uri(),
        }
    }

    #[test]
    fn test_endpoint_built_from_model() {
        let config = GeminiConfig {
            api_key: "k".to_string(),
            model: "models/gemini-1.5-flash".to_string(),
            base_url: "https://example.test/v1beta/".to_string(),
        };
        let client = GeminiClient::new(&config).unwrap();
        assert_eq!(
            client.endpoint().as_str(),
            "https://example.test/v1beta/models/gemini-1.5-flash:generateContent"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let config = GeminiConfig {
            api_key: "k".to_string(),
            model: "gemini-pro".to_string(),
            base_url: "not a url".to_string(),
        };
        assert!(matches!(
            GeminiClient::new(&config),
            Err(GenerationError::Endpoint(_))
        ));
    }

    #[test_log::test(tokio::test)]
    async fn test_generate_returns_joined_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-pro:generateContent"))
            .and(header("x-goog-api-key", "test-key"))
            .and(body_json(json!({
                "contents": [{"role": "user", "parts": [{"text": "find flights"}]}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": {"role": "model", "parts": [{"text": "1. Delta "}, {"text": "$450"}]},
                    "finishReason": "STOP"
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = GeminiClient::new(&config_for(&server)).unwrap();
        let text = client.generate("find flights").await.unwrap();
        assert_eq!(text, "1. Delta $450");
    }

    #[tokio::test]
    async fn test_generate_surfaces_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "error": {"code": 429, "message": "Quota exceeded", "status": "RESOURCE_EXHAUSTED"}
            })))
            .mount(&server)
            .await;

        let client = GeminiClient::new(&config_for(&server)).unwrap();
        match client.generate("anything").await {
            Err(GenerationError::Api { status, message }) => {
                assert_eq!(status, 429);
                assert_eq!(message, "Quota exceeded (RESOURCE_EXHAUSTED)");
            }
            other => panic!("expected API error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_generate_blocked_prompt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "promptFeedback": {"blockReason": "SAFETY"}
            })))
            .mount(&server)
            .await;

        let client = GeminiClient::new(&config_for(&server)).unwrap();
        assert!(matches!(
            client.generate("anything").await,
            Err(GenerationError::Blocked(reason)) if reason == "SAFETY"
        ));
    }

    #[tokio::test]
    async fn test_generate_candidate_without_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"finishReason": "RECITATION"}]
            })))
            .mount(&server)
            .await;

        let client = GeminiClient::new(&config_for(&server)).unwrap();
        let err = client.generate("anything").await.unwrap_err();
        assert!(err.to_string().contains("RECITATION"));
    }

    #[tokio::test]
    async fn test_generate_unreachable_service() {
        let config = GeminiConfig {
            api_key: "k".to_string(),
            model: "gemini-pro".to_string(),
            base_url: "http://127.0.0.1:1".to_string(),
        };
        let client = GeminiClient::new(&config).unwrap();
        assert!(matches!(
            client.generate("anything").await,
            Err(GenerationError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn test_transport_error_does_not_expose_key() {
        let config = GeminiConfig {
            api_key: "SUPER-SECRET-KEY".to_string(),
            model: "gemini-pro".to_string(),
            base_url: "http://127.0.0.1:1".to_string(),
        };
        let client = GeminiClient::new(&config).unwrap();
        let err = client.generate("anything").await.unwrap_err();
        assert!(matches!(err, GenerationError::Transport(_)));
        assert!(!err.to_string().contains("SUPER-SECRET-KEY"));
        assert!(!format!("{err:?}").contains("SUPER-SECRET-KEY"));
    }

    #[tokio::test]
    async fn test_key_sent_as_header_not_query() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("x-goog-api-key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"text": "ok"}]}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = GeminiClient::new(&config_for(&server)).unwrap();
        client.generate("anything").await.unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].url.query().is_none());
    }

    #[tokio::test]
    async fn test_generate_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy error</html>"))
            .mount(&server)
            .await;

        let client = GeminiClient::new(&config_for(&server)).unwrap();
        assert!(matches!(
            client.generate("anything").await,
            Err(GenerationError::Malformed(_))
        ));
    }

    #[test]
    fn test_extract_api_error_falls_back_to_body() {
        assert_eq!(extract_api_error("  upstream down \n"), "upstream down");
    }
}
