//! Error types for the evaluation engine.
//!
//! Provider errors live here rather than in `cadence-providers` so the
//! feedback orchestrator can downcast and classify them for retry decisions
//! without string matching.

use thiserror::Error;

/// Errors that can occur when interacting with a text-generation backend.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The API returned a 429 rate limit response.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Authentication failed (invalid API key).
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The requested model was not found.
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// The API returned an error response.
    #[error("API error (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    NetworkError(String),
}

impl ProviderError {
    /// Returns `true` if this error is permanent and should not be retried.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            ProviderError::AuthenticationFailed(_) | ProviderError::ModelNotFound(_)
        )
    }

    /// Returns the retry-after delay in milliseconds, if applicable.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            ProviderError::RateLimited { retry_after_ms } => Some(*retry_after_ms),
            _ => None,
        }
    }
}

/// A feature vector or sample document that cannot be evaluated.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("invalid value for `{field}`: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("malformed input: {0}")]
    Malformed(String),
}

impl InputError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

/// Generated text that could not be turned into feedback.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("response is empty")]
    Empty,

    #[error("no JSON object found in response")]
    NoObject,

    #[error("invalid JSON after repair: {0}")]
    Json(#[from] serde_json::Error),

    #[error("top-level JSON value is not an object")]
    NotAnObject,

    #[error("no feedback categories found in response")]
    NoCategories,
}

/// Failures of the skill-classification model.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model unavailable: {0}")]
    Unavailable(String),

    #[error("expected {expected} features, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("prediction failed: {0}")]
    Prediction(String),
}

/// Errors surfaced to callers of the engine.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error("invalid configuration: {0}")]
    Config(String),
}
