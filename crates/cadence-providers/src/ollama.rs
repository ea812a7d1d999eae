//! Ollama (local model) provider implementation.
//!
//! Uses `/api/generate` with a raw prompt. For JSON responses the `format`
//! field carries either `"json"` or the full feedback schema, which Ollama
//! enforces through constrained decoding.

use std::time::{Duration, Instant};

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use cadence_core::traits::{
    feedback_json_schema, GenerateRequest, GenerateResponse, ResponseFormat, TextGenerator,
    TokenUsage,
};

use crate::error::{status_error, ProviderError};

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_TIMEOUT_SECS: u64 = 300; // local models are slower

/// Ollama local model provider.
pub struct OllamaProvider {
    base_url: String,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let base = if base_url.is_empty() {
            DEFAULT_BASE_URL
        } else {
            base_url.trim_end_matches('/')
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            base_url: base.to_string(),
            client,
        })
    }

    fn unreachable(&self) -> ProviderError {
        ProviderError::NetworkError(format!(
            "Ollama not reachable at {}. Is it running? Start with: ollama serve",
            self.base_url
        ))
    }
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<serde_json::Value>,
    options: OllamaOptions<'a>,
}

#[derive(Serialize)]
struct OllamaOptions<'a> {
    temperature: f64,
    top_p: f64,
    top_k: u32,
    num_predict: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<&'a [String]>,
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
    model: String,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

fn format_field(format: ResponseFormat) -> Option<serde_json::Value> {
    match format {
        ResponseFormat::GuidedJson => Some(feedback_json_schema()),
        ResponseFormat::Json => Some(serde_json::Value::String("json".into())),
        ResponseFormat::Markdown => None,
    }
}

#[async_trait]
impl TextGenerator for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    #[instrument(skip(self, request), fields(model = %request.model))]
    async fn generate(&self, request: &GenerateRequest) -> anyhow::Result<GenerateResponse> {
        let start = Instant::now();

        let body = OllamaRequest {
            model: &request.model,
            prompt: &request.prompt,
            stream: false,
            format: format_field(request.response_format),
            options: OllamaOptions {
                temperature: request.temperature,
                top_p: request.top_p,
                top_k: request.top_k,
                num_predict: request.max_tokens,
                stop: (!request.stop.is_empty()).then_some(request.stop.as_slice()),
            },
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(DEFAULT_TIMEOUT_SECS)
                } else if e.is_connect() {
                    self.unreachable()
                } else {
                    ProviderError::NetworkError(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        if status == 404 {
            return Err(ProviderError::ModelNotFound(format!(
                "Model '{}' not found locally. Pull it with: ollama pull {}",
                request.model, request.model
            ))
            .into());
        }
        if status >= 400 {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, body, None).into());
        }

        let api_response: OllamaResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status: 0,
                message: format!("failed to parse response: {e}"),
            })?;

        let latency_ms = start.elapsed().as_millis() as u64;
        let prompt_tokens = api_response.prompt_eval_count.unwrap_or(0);
        let completion_tokens = api_response.eval_count.unwrap_or(0);

        Ok(GenerateResponse {
            text: api_response.response,
            model: api_response.model,
            token_usage: TokenUsage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            },
            latency_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(format: ResponseFormat) -> GenerateRequest {
        GenerateRequest {
            model: "mistral:7b-instruct".into(),
            prompt: "Give feedback".into(),
            temperature: 0.2,
            top_p: 0.7,
            top_k: 5,
            max_tokens: 2000,
            stop: vec![],
            response_format: format,
        }
    }

    #[tokio::test]
    async fn successful_generation_with_schema() {
        let server = MockServer::start().await;

        let response_body = serde_json::json!({
            "model": "mistral:7b-instruct",
            "response": "{\"speed_tip\":[\"a\",\"b\",\"c\"]}",
            "done": true,
            "prompt_eval_count": 30,
            "eval_count": 15
        });

        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_partial_json(serde_json::json!({
                "stream": false,
                "format": {"type": "object"},
                "options": {"num_predict": 2000, "top_k": 5}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(&response_body))
            .mount(&server)
            .await;

        let provider = OllamaProvider::new(&server.uri()).unwrap();
        let response = provider
            .generate(&request(ResponseFormat::GuidedJson))
            .await
            .unwrap();
        assert!(response.text.contains("speed_tip"));
        assert_eq!(response.token_usage.total_tokens, 45);
    }

    #[test]
    fn format_field_per_response_format() {
        assert_eq!(
            format_field(ResponseFormat::Json),
            Some(serde_json::json!("json"))
        );
        assert!(format_field(ResponseFormat::Markdown).is_none());
        assert_eq!(
            format_field(ResponseFormat::GuidedJson).unwrap()["properties"]["rythm_tip"]["minItems"],
            3
        );
    }

    #[tokio::test]
    async fn model_not_found() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(404).set_body_string("model not found"))
            .mount(&server)
            .await;

        let provider = OllamaProvider::new(&server.uri()).unwrap();
        let err = provider
            .generate(&request(ResponseFormat::Json))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
        assert!(err.downcast_ref::<ProviderError>().unwrap().is_permanent());
    }

    #[tokio::test]
    async fn unreachable_server() {
        // nothing listens on port 9 locally
        let provider = OllamaProvider::new("http://127.0.0.1:9").unwrap();
        let err = provider
            .generate(&request(ResponseFormat::Json))
            .await
            .unwrap_err();
        let provider_err = err.downcast_ref::<ProviderError>().unwrap();
        assert!(matches!(provider_err, ProviderError::NetworkError(_)));
        assert!(!provider_err.is_permanent());
    }
}
