//! OpenAI-compatible text completion provider (`/v1/completions`).
//!
//! Hosted model services such as ArliAI expose this endpoint for instruction
//! models. Services that support guided decoding accept the feedback schema in
//! a `guided_json` field.

use std::time::{Duration, Instant};

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use cadence_core::traits::{
    feedback_json_schema, GenerateRequest, GenerateResponse, ResponseFormat, TextGenerator,
    TokenUsage,
};

use crate::error::{retry_after, status_error, ProviderError};

pub const DEFAULT_BASE_URL: &str = "https://api.arliai.com";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Provider for any service speaking the OpenAI completions protocol.
pub struct CompletionsProvider {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl CompletionsProvider {
    pub fn new(api_key: &str, base_url: Option<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            api_key: api_key.to_string(),
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            client,
        })
    }
}

#[derive(Serialize)]
struct CompletionsRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    temperature: f64,
    top_p: f64,
    top_k: u32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    guided_json: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct CompletionsResponse {
    choices: Vec<CompletionsChoice>,
    #[serde(default)]
    usage: CompletionsUsage,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Deserialize)]
struct CompletionsChoice {
    text: String,
}

#[derive(Deserialize, Default)]
struct CompletionsUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

#[async_trait]
impl TextGenerator for CompletionsProvider {
    fn name(&self) -> &str {
        "completions"
    }

    #[instrument(skip(self, request), fields(model = %request.model))]
    async fn generate(&self, request: &GenerateRequest) -> anyhow::Result<GenerateResponse> {
        let start = Instant::now();

        let body = CompletionsRequest {
            model: &request.model,
            prompt: &request.prompt,
            temperature: request.temperature,
            top_p: request.top_p,
            top_k: request.top_k,
            max_tokens: request.max_tokens,
            stop: (!request.stop.is_empty()).then_some(request.stop.as_slice()),
            guided_json: (request.response_format == ResponseFormat::GuidedJson)
                .then(feedback_json_schema),
        };

        let response = self
            .client
            .post(format!("{}/v1/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(DEFAULT_TIMEOUT_SECS)
                } else {
                    ProviderError::NetworkError(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        if status >= 400 {
            let retry_after_secs = retry_after(&response);
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, body, retry_after_secs).into());
        }

        let api_response: CompletionsResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status: 0,
                message: format!("failed to parse response: {e}"),
            })?;

        let latency_ms = start.elapsed().as_millis() as u64;
        let text = api_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.text)
            .ok_or_else(|| ProviderError::ApiError {
                status,
                message: "response contained no choices".into(),
            })?;

        Ok(GenerateResponse {
            text,
            model: api_response.model.unwrap_or_else(|| request.model.clone()),
            token_usage: TokenUsage {
                prompt_tokens: api_response.usage.prompt_tokens,
                completion_tokens: api_response.usage.completion_tokens,
                total_tokens: api_response.usage.total_tokens,
            },
            latency_ms,
        })
    }
}
