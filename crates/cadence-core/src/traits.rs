//! The text-generation seam.
//!
//! `TextGenerator` abstracts every backend that can produce coaching text,
//! whether a remote completion service or a locally hosted model with
//! constrained decoding. Implementations live in `cadence-providers`.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Trait for backends that turn a prompt into text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Human-readable backend name (e.g. "ollama").
    fn name(&self) -> &str;

    /// Generate a completion for the prompt.
    async fn generate(&self, request: &GenerateRequest) -> anyhow::Result<GenerateResponse>;
}

/// Shape the generated text is expected to take.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    /// Free-form JSON object requested through the prompt only.
    #[default]
    Json,
    /// JSON object enforced by the backend through a schema.
    GuidedJson,
    /// `**Category**` headings followed by bullet lines.
    Markdown,
}

impl ResponseFormat {
    pub fn is_json(self) -> bool {
        matches!(self, ResponseFormat::Json | ResponseFormat::GuidedJson)
    }
}

impl fmt::Display for ResponseFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseFormat::Json => write!(f, "json"),
            ResponseFormat::GuidedJson => write!(f, "guided_json"),
            ResponseFormat::Markdown => write!(f, "markdown"),
        }
    }
}

impl FromStr for ResponseFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ResponseFormat::Json),
            "guided_json" | "guided-json" | "guided" => Ok(ResponseFormat::GuidedJson),
            "markdown" | "md" => Ok(ResponseFormat::Markdown),
            other => Err(format!("unknown response format: {other}")),
        }
    }
}

/// Request to generate text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    /// Model identifier. Backends with a single model may ignore it.
    pub model: String,
    /// The full prompt.
    pub prompt: String,
    /// Sampling temperature.
    pub temperature: f64,
    /// Nucleus sampling mass.
    pub top_p: f64,
    /// Number of top tokens considered.
    pub top_k: u32,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Stop sequences.
    #[serde(default)]
    pub stop: Vec<String>,
    /// Expected output shape; JSON-capable backends use it to constrain decoding.
    #[serde(default)]
    pub response_format: ResponseFormat,
}

/// Response from a generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    /// The raw generated text.
    pub text: String,
    /// Model that actually generated the response.
    pub model: String,
    /// Token usage.
    pub token_usage: TokenUsage,
    /// Latency in milliseconds.
    pub latency_ms: u64,
}

/// Token accounting reported by the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// JSON schema of a feedback object: four tip lists of exactly three strings.
///
/// Backends that support constrained decoding pass this along with
/// [`ResponseFormat::GuidedJson`].
pub fn feedback_json_schema() -> serde_json::Value {
    let tips = serde_json::json!({
        "type": "array",
        "items": {"type": "string"},
        "minItems": 3,
        "maxItems": 3
    });
    serde_json::json!({
        "type": "object",
        "properties": {
            "speed_tip": tips,
            "clarity_tip": tips,
            "articulation_tip": tips,
            "rythm_tip": tips
        },
        "required": ["speed_tip", "clarity_tip", "articulation_tip", "rythm_tip"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_format_display_and_parse() {
        assert_eq!(ResponseFormat::GuidedJson.to_string(), "guided_json");
        assert_eq!(
            "markdown".parse::<ResponseFormat>().unwrap(),
            ResponseFormat::Markdown
        );
        assert_eq!(
            "guided-json".parse::<ResponseFormat>().unwrap(),
            ResponseFormat::GuidedJson
        );
        assert!("yaml".parse::<ResponseFormat>().is_err());
        assert!(ResponseFormat::Json.is_json());
        assert!(!ResponseFormat::Markdown.is_json());
    }

    #[test]
    fn schema_requires_all_tip_keys() {
        let schema = feedback_json_schema();
        let required = schema["required"].as_array().unwrap();
        assert_eq!(required.len(), 4);
        assert_eq!(schema["properties"]["rythm_tip"]["maxItems"], 3);
    }

    #[test]
    fn request_defaults_format_when_absent() {
        let json = r#"{"model":"m","prompt":"p","temperature":0.2,"top_p":0.7,
            "top_k":5,"max_tokens":300}"#;
        let request: GenerateRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.response_format, ResponseFormat::Json);
        assert!(request.stop.is_empty());
    }
}
