//! Provider and configuration error types.

use std::path::PathBuf;

use thiserror::Error;

pub use cadence_core::error::ProviderError;

/// Problems with the provider configuration itself.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly requested config file does not exist.
    #[error("config file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// A provider name that has no `[providers.<name>]` section.
    #[error("unknown provider '{0}' (configured: {1})")]
    UnknownProvider(String, String),

    /// A provider that needs a key was configured without one.
    #[error("provider '{0}' has no API key; set it in the config or via {1}")]
    MissingApiKey(String, &'static str),
}

/// Map an HTTP error status to a [`ProviderError`].
///
/// `retry_after_secs` is the parsed `Retry-After` header, if any.
pub(crate) fn status_error(status: u16, body: String, retry_after_secs: Option<u64>) -> ProviderError {
    match status {
        429 => ProviderError::RateLimited {
            retry_after_ms: retry_after_secs.unwrap_or(5).saturating_mul(1000),
        },
        401 | 403 => ProviderError::AuthenticationFailed(body),
        404 => ProviderError::ModelNotFound(body),
        _ => ProviderError::ApiError {
            status,
            message: body,
        },
    }
}

/// Parse the `Retry-After` header as whole seconds.
pub(crate) fn retry_after(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
}
