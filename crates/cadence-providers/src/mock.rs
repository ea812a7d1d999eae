//! Mock generator for testing.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use cadence_core::traits::{GenerateRequest, GenerateResponse, TextGenerator, TokenUsage};

use crate::error::ProviderError;

/// Well-formed feedback returned when no response is configured.
pub const DEFAULT_RESPONSE: &str = r#"{"speed_tip":["Your pace was close to the original audio.","Keep moving between words at the same steady speed.","Regular practice will keep your pace natural."],"clarity_tip":["Your words came through clearly.","Keep giving the end of each word its full sound.","Staying relaxed will help every word stay clear."],"articulation_tip":["You shaped your sounds much like the original audio.","Open your mouth a little more on long vowels.","Short warm-ups will keep your sounds crisp."],"rythm_tip":["Your pauses fell in natural places.","Keep the breaks between phrases short.","Noticing where a sentence naturally breaks will keep your flow smooth."]}"#;

/// One scripted reply.
#[derive(Debug, Clone)]
pub enum MockReply {
    Text(String),
    /// Fail with a provider error of the given kind.
    Error(MockFailure),
}

/// Provider failures a mock can simulate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    RateLimited { retry_after_ms: u64 },
    AuthenticationFailed,
    Network,
}

impl MockFailure {
    fn to_error(self) -> ProviderError {
        match self {
            MockFailure::RateLimited { retry_after_ms } => {
                ProviderError::RateLimited { retry_after_ms }
            }
            MockFailure::AuthenticationFailed => {
                ProviderError::AuthenticationFailed("mock rejected the key".into())
            }
            MockFailure::Network => ProviderError::NetworkError("mock connection reset".into()),
        }
    }
}

/// A scripted text generator for exercising the feedback loop without a
/// real backend.
///
/// Scripted replies are consumed in order; once exhausted, every call returns
/// the fixed response.
pub struct MockGenerator {
    script: Mutex<VecDeque<MockReply>>,
    /// Reply once the script is exhausted.
    fixed_response: String,
    /// Number of calls made.
    call_count: AtomicU32,
    /// Last request received.
    last_request: Mutex<Option<GenerateRequest>>,
}

impl MockGenerator {
    /// Create a mock that always returns the same text.
    pub fn with_fixed_response(response: &str) -> Self {
        Self::with_script(Vec::new(), response)
    }

    /// Create a mock that plays `script` first, then repeats `fallback`.
    pub fn with_script(script: Vec<MockReply>, fallback: &str) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fixed_response: fallback.to_string(),
            call_count: AtomicU32::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Get the number of calls made to this generator.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Get the last request made to this generator.
    pub fn last_request(&self) -> Option<GenerateRequest> {
        self.last_request
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::with_fixed_response(DEFAULT_RESPONSE)
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(&self, request: &GenerateRequest) -> anyhow::Result<GenerateResponse> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        *self.last_request.lock().unwrap_or_else(|e| e.into_inner()) = Some(request.clone());

        let next = self
            .script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        let text = match next {
            Some(MockReply::Text(text)) => text,
            Some(MockReply::Error(failure)) => return Err(failure.to_error().into()),
            None => self.fixed_response.clone(),
        };

        let prompt_tokens = (request.prompt.len() / 4) as u32; // rough estimate
        let completion_tokens = (text.len() / 4) as u32;

        Ok(GenerateResponse {
            text,
            model: request.model.clone(),
            token_usage: TokenUsage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            },
            latency_ms: 1,
        })
    }
}
