//! cadence-providers: Text-generation backends.
//!
//! Implements the `TextGenerator` trait for OpenAI-compatible completion
//! services, local Ollama models, and a scripted mock, and loads the
//! `cadence.toml` configuration that selects between them.

pub mod completions;
pub mod config;
pub mod error;
pub mod mock;
pub mod ollama;

pub use config::{create_provider, load_config, CadenceConfig, FeedbackSettings, ProviderConfig};
pub use error::{ConfigError, ProviderError};
