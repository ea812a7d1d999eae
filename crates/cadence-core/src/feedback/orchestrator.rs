//! Bounded request/parse/retry loop around a [`TextGenerator`].
//!
//! The loop is an explicit state machine. A prompt is built once, then each
//! attempt moves through `Request` and `Validate`; failures go to `Retry`,
//! which either schedules the next attempt or gives up. The two terminal
//! states are `Success` and `Fallback`, and [`FeedbackOrchestrator::run`]
//! never returns an error.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::parse::parse_feedback;
use super::prompt::build_prompt;
use super::FeedbackResult;
use crate::difference::DifferenceVector;
use crate::error::ProviderError;
use crate::traits::{GenerateRequest, ResponseFormat, TextGenerator};

/// Upper bound for the exponential retry delay.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Configuration for feedback generation.
#[derive(Debug, Clone)]
pub struct FeedbackConfig {
    /// Model identifier passed to the generator.
    pub model: String,
    pub temperature: f64,
    pub top_p: f64,
    pub top_k: u32,
    pub max_tokens: u32,
    /// Stop sequences.
    pub stop: Vec<String>,
    /// Expected output shape; selects the prompt's output section and parser.
    pub response_format: ResponseFormat,
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Timeout applied to each generator call.
    pub request_timeout: Duration,
    /// Delay before the second attempt; doubled for each later one.
    pub retry_delay: Duration,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            model: "default".to_string(),
            temperature: 0.2,
            top_p: 0.7,
            top_k: 5,
            max_tokens: 600,
            stop: Vec::new(),
            response_format: ResponseFormat::Json,
            max_attempts: 3,
            request_timeout: Duration::from_secs(60),
            retry_delay: Duration::from_millis(500),
        }
    }
}

/// How the loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Terminal {
    Success,
    Fallback,
}

/// Feedback plus how it was obtained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackOutcome {
    pub feedback: FeedbackResult,
    /// Generator calls made (0 only if the loop never reached a request).
    pub attempts: u32,
    pub terminal: Terminal,
}

impl FeedbackOutcome {
    pub fn is_fallback(&self) -> bool {
        self.terminal == Terminal::Fallback
    }
}

#[derive(Debug)]
enum State {
    Request { attempt: u32 },
    Validate { attempt: u32, raw: String },
    Retry { attempt: u32, delay: Option<Duration> },
    Success { attempt: u32, feedback: FeedbackResult },
    Fallback { attempts: u32 },
}

/// Drives one feedback request from prompt to terminal state.
pub struct FeedbackOrchestrator {
    generator: Arc<dyn TextGenerator>,
    config: FeedbackConfig,
}

impl FeedbackOrchestrator {
    pub fn new(generator: Arc<dyn TextGenerator>, config: FeedbackConfig) -> Self {
        Self { generator, config }
    }

    pub fn config(&self) -> &FeedbackConfig {
        &self.config
    }

    pub fn generator_name(&self) -> &str {
        self.generator.name()
    }

    /// Produce feedback for one evaluation. Always well-formed; generator and
    /// parse failures end in [`FeedbackResult::fallback`].
    pub async fn run(&self, diff: &DifferenceVector, clarity_deviation: f64) -> FeedbackOutcome {
        let request = self.build_request(diff, clarity_deviation);
        tracing::debug!(
            generator = self.generator.name(),
            prompt_len = request.prompt.len(),
            "built feedback prompt"
        );

        let mut state = State::Request { attempt: 1 };
        loop {
            state = match state {
                State::Success { attempt, feedback } => {
                    tracing::info!(attempts = attempt, "feedback generated");
                    return FeedbackOutcome {
                        feedback,
                        attempts: attempt,
                        terminal: Terminal::Success,
                    };
                }
                State::Fallback { attempts } => {
                    tracing::warn!(attempts, "feedback generation failed, using fallback");
                    return FeedbackOutcome {
                        feedback: FeedbackResult::fallback(),
                        attempts,
                        terminal: Terminal::Fallback,
                    };
                }
                State::Request { attempt } => self.request(&request, attempt).await,
                State::Validate { attempt, raw } => self.validate(attempt, &raw),
                State::Retry { attempt, delay } => self.retry(attempt, delay).await,
            };
        }
    }

    fn build_request(&self, diff: &DifferenceVector, clarity_deviation: f64) -> GenerateRequest {
        GenerateRequest {
            model: self.config.model.clone(),
            prompt: build_prompt(diff, clarity_deviation, self.config.response_format),
            temperature: self.config.temperature,
            top_p: self.config.top_p,
            top_k: self.config.top_k,
            max_tokens: self.config.max_tokens,
            stop: self.config.stop.clone(),
            response_format: self.config.response_format,
        }
    }

    async fn request(&self, request: &GenerateRequest, attempt: u32) -> State {
        tracing::debug!(attempt, "requesting feedback");
        let call = self.generator.generate(request);
        match tokio::time::timeout(self.config.request_timeout, call).await {
            Ok(Ok(response)) => {
                tracing::debug!(
                    attempt,
                    latency_ms = response.latency_ms,
                    completion_tokens = response.token_usage.completion_tokens,
                    "generator responded"
                );
                State::Validate {
                    attempt,
                    raw: response.text,
                }
            }
            Ok(Err(err)) => match err.downcast_ref::<ProviderError>() {
                Some(provider_err) if provider_err.is_permanent() => {
                    tracing::warn!(attempt, error = %provider_err, "permanent generator error");
                    State::Fallback { attempts: attempt }
                }
                Some(provider_err) => {
                    tracing::warn!(attempt, error = %provider_err, "generator error");
                    State::Retry {
                        attempt,
                        delay: provider_err.retry_after_ms().map(Duration::from_millis),
                    }
                }
                None => {
                    tracing::warn!(attempt, error = %err, "generator error");
                    State::Retry {
                        attempt,
                        delay: None,
                    }
                }
            },
            Err(_) => {
                tracing::warn!(
                    attempt,
                    timeout_ms = self.config.request_timeout.as_millis() as u64,
                    "generator timed out"
                );
                State::Retry {
                    attempt,
                    delay: None,
                }
            }
        }
    }

    fn validate(&self, attempt: u32, raw: &str) -> State {
        match parse_feedback(raw, self.config.response_format) {
            Ok(parsed) if parsed.is_complete() => State::Success {
                attempt,
                feedback: parsed.feedback,
            },
            Ok(parsed) => {
                tracing::warn!(attempt, missing = ?parsed.missing, "feedback is missing categories");
                State::Retry {
                    attempt,
                    delay: None,
                }
            }
            Err(err) => {
                tracing::warn!(attempt, error = %err, "could not parse feedback");
                State::Retry {
                    attempt,
                    delay: None,
                }
            }
        }
    }

    async fn retry(&self, attempt: u32, hint: Option<Duration>) -> State {
        if attempt >= self.config.max_attempts.max(1) {
            return State::Fallback { attempts: attempt };
        }
        let delay = hint
            .map(|d| d.min(MAX_RETRY_DELAY))
            .unwrap_or_else(|| self.backoff(attempt));
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        State::Request {
            attempt: attempt + 1,
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.config
            .retry_delay
            .saturating_mul(factor)
            .min(MAX_RETRY_DELAY)
    }
}

impl std::fmt::Debug for FeedbackOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedbackOrchestrator")
            .field("generator", &self.generator.name())
            .field("config", &self.config)
            .finish()
    }
}
