//! Configuration loading and provider factory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use cadence_core::feedback::FeedbackConfig;
use cadence_core::scoring::ScoringConfig;
use cadence_core::traits::{ResponseFormat, TextGenerator};
use cadence_core::transcript::DEFAULT_TOLERANCE;

use crate::completions::CompletionsProvider;
use crate::error::ConfigError;
use crate::mock::MockGenerator;
use crate::ollama::OllamaProvider;

/// Configuration for a single text-generation backend.
///
/// Note: Custom Debug impl masks API keys to prevent accidental exposure in logs.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderConfig {
    Completions {
        api_key: String,
        #[serde(default)]
        base_url: Option<String>,
    },
    Ollama {
        #[serde(default = "default_ollama_url")]
        base_url: String,
    },
    /// Offline generator; replies with `response`, or well-formed feedback.
    Mock {
        #[serde(default)]
        response: Option<String>,
    },
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderConfig::Completions {
                api_key: _,
                base_url,
            } => f
                .debug_struct("Completions")
                .field("api_key", &"***")
                .field("base_url", base_url)
                .finish(),
            ProviderConfig::Ollama { base_url } => f
                .debug_struct("Ollama")
                .field("base_url", base_url)
                .finish(),
            ProviderConfig::Mock { response } => f
                .debug_struct("Mock")
                .field("response", response)
                .finish(),
        }
    }
}

fn default_ollama_url() -> String {
    crate::ollama::DEFAULT_BASE_URL.to_string()
}

/// Sampling and retry settings for feedback generation (`[feedback]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackSettings {
    pub temperature: f64,
    pub top_p: f64,
    pub top_k: u32,
    pub max_tokens: u32,
    pub stop: Vec<String>,
    pub response_format: ResponseFormat,
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub request_timeout_secs: u64,
    pub retry_delay_ms: u64,
}

impl Default for FeedbackSettings {
    fn default() -> Self {
        let defaults = FeedbackConfig::default();
        Self {
            temperature: defaults.temperature,
            top_p: defaults.top_p,
            top_k: defaults.top_k,
            max_tokens: defaults.max_tokens,
            stop: defaults.stop,
            response_format: defaults.response_format,
            max_attempts: defaults.max_attempts,
            request_timeout_secs: defaults.request_timeout.as_secs(),
            retry_delay_ms: defaults.retry_delay.as_millis() as u64,
        }
    }
}

impl FeedbackSettings {
    /// Build the orchestrator configuration for `model`.
    pub fn to_feedback_config(&self, model: &str) -> FeedbackConfig {
        FeedbackConfig {
            model: model.to_string(),
            temperature: self.temperature,
            top_p: self.top_p,
            top_k: self.top_k,
            max_tokens: self.max_tokens,
            stop: self.stop.clone(),
            response_format: self.response_format,
            max_attempts: self.max_attempts,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            retry_delay: Duration::from_millis(self.retry_delay_ms),
        }
    }
}

/// Top-level cadence configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CadenceConfig {
    /// Provider configurations keyed by name.
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    /// Provider used for feedback when none is given on the command line.
    /// With no provider at all, feedback is skipped.
    #[serde(default)]
    pub default_provider: Option<String>,
    #[serde(default = "default_model")]
    pub default_model: String,
    #[serde(default)]
    pub feedback: FeedbackSettings,
    #[serde(default)]
    pub scoring: ScoringConfig,
    /// WER below this is not counted against clarity.
    #[serde(default = "default_clarity_tolerance")]
    pub clarity_tolerance: f64,
    /// Decision-tree artifact for skill classification.
    #[serde(default)]
    pub classifier_model: Option<PathBuf>,
    /// Max samples assessed concurrently.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
    /// Output directory for reports.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_model() -> String {
    "Mistral-Nemo-12B-Instruct-2407".to_string()
}
fn default_clarity_tolerance() -> f64 {
    DEFAULT_TOLERANCE
}
fn default_parallelism() -> usize {
    4
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("./cadence-results")
}

impl Default for CadenceConfig {
    fn default() -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: None,
            default_model: default_model(),
            feedback: FeedbackSettings::default(),
            scoring: ScoringConfig::default(),
            clarity_tolerance: default_clarity_tolerance(),
            classifier_model: None,
            parallelism: default_parallelism(),
            output_dir: default_output_dir(),
        }
    }
}

impl CadenceConfig {
    /// Check cross-field consistency that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if let Some(name) = &self.default_provider {
            if !self.providers.contains_key(name) {
                return Err(ConfigError::UnknownProvider(name.clone(), self.provider_names()).into());
            }
        }
        self.scoring.validate()?;
        if !self.clarity_tolerance.is_finite() || self.clarity_tolerance < 0.0 {
            anyhow::bail!(
                "clarity_tolerance must be a non-negative number, got {}",
                self.clarity_tolerance
            );
        }
        if self.parallelism == 0 {
            anyhow::bail!("parallelism must be at least 1");
        }
        if self.feedback.request_timeout_secs == 0 {
            anyhow::bail!("feedback.request_timeout_secs must be at least 1");
        }
        Ok(())
    }

    /// Look up a provider by name.
    pub fn provider(&self, name: &str) -> Result<&ProviderConfig> {
        self.providers
            .get(name)
            .ok_or_else(|| ConfigError::UnknownProvider(name.to_string(), self.provider_names()).into())
    }

    fn provider_names(&self) -> String {
        let mut names: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        names.sort_unstable();
        if names.is_empty() {
            "none".to_string()
        } else {
            names.join(", ")
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let value = std::env::var(var_name).unwrap_or_default();
            result = format!(
                "{}{}{}",
                &result[..start],
                value,
                &result[start + end + 1..]
            );
        } else {
            break;
        }
    }
    result
}

fn resolve_provider_config(config: &ProviderConfig) -> ProviderConfig {
    match config {
        ProviderConfig::Completions { api_key, base_url } => ProviderConfig::Completions {
            api_key: resolve_env_vars(api_key),
            base_url: base_url.as_ref().map(|u| resolve_env_vars(u)),
        },
        ProviderConfig::Ollama { base_url } => ProviderConfig::Ollama {
            base_url: resolve_env_vars(base_url),
        },
        ProviderConfig::Mock { response } => ProviderConfig::Mock {
            response: response.clone(),
        },
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `cadence.toml` in the current directory
/// 2. `~/.config/cadence/config.toml`
///
/// Environment variable overrides: `CADENCE_COMPLETIONS_KEY`, `CADENCE_OLLAMA_URL`.
pub fn load_config() -> Result<CadenceConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<CadenceConfig> {
    let config_path = match path {
        Some(p) if p.exists() => Some(p.to_path_buf()),
        Some(p) => return Err(ConfigError::NotFound(p.to_path_buf()).into()),
        None => {
            let local = PathBuf::from("cadence.toml");
            if local.exists() {
                Some(local)
            } else {
                dirs_path()
                    .map(|dir| dir.join("config.toml"))
                    .filter(|global| global.exists())
            }
        }
    };

    let mut config = match &config_path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<CadenceConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => CadenceConfig::default(),
    };
    tracing::debug!(path = ?config_path, "loaded configuration");

    apply_env_overrides(&mut config);

    config.providers = config
        .providers
        .iter()
        .map(|(k, v)| (k.clone(), resolve_provider_config(v)))
        .collect();

    Ok(config)
}

fn apply_env_overrides(config: &mut CadenceConfig) {
    if let Ok(key) = std::env::var("CADENCE_COMPLETIONS_KEY") {
        let entry = config
            .providers
            .entry("completions".into())
            .or_insert(ProviderConfig::Completions {
                api_key: String::new(),
                base_url: None,
            });
        if let ProviderConfig::Completions { api_key, .. } = entry {
            *api_key = key;
        }
    }

    if let Ok(url) = std::env::var("CADENCE_OLLAMA_URL") {
        let entry = config
            .providers
            .entry("ollama".into())
            .or_insert_with(|| ProviderConfig::Ollama {
                base_url: default_ollama_url(),
            });
        if let ProviderConfig::Ollama { base_url } = entry {
            *base_url = url;
        }
    }
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("cadence"))
}

/// Create a generator instance from its configuration.
pub fn create_provider(name: &str, config: &ProviderConfig) -> Result<Arc<dyn TextGenerator>> {
    match config {
        ProviderConfig::Completions { api_key, base_url } => {
            if api_key.is_empty() {
                return Err(
                    ConfigError::MissingApiKey(name.to_string(), "CADENCE_COMPLETIONS_KEY").into(),
                );
            }
            Ok(Arc::new(CompletionsProvider::new(api_key, base_url.clone())?))
        }
        ProviderConfig::Ollama { base_url } => Ok(Arc::new(OllamaProvider::new(base_url)?)),
        ProviderConfig::Mock { response } => Ok(Arc::new(match response {
            Some(text) => MockGenerator::with_fixed_response(text),
            None => MockGenerator::default(),
        })),
    }
}
