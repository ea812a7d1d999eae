//! Sample file parser.
//!
//! Loads reference/user sample pairs from TOML or JSON files and directories,
//! and checks them for suspicious measurements.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::model::{FeatureVector, SamplePair};

/// Largest tolerated gap between a stored ratio and speaking/total duration.
const RATIO_TOLERANCE: f64 = 0.05;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SampleFile {
    #[serde(default)]
    samples: Vec<SamplePair>,
}

/// Sample file syntax, picked from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    Toml,
    Json,
}

impl SampleFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "toml" => Some(SampleFormat::Toml),
            "json" => Some(SampleFormat::Json),
            _ => None,
        }
    }
}

/// Parse a single sample file.
pub fn parse_sample(path: &Path) -> Result<Vec<SamplePair>> {
    let format = SampleFormat::from_path(path)
        .with_context(|| format!("unsupported sample file type: {}", path.display()))?;
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read sample file: {}", path.display()))?;

    parse_sample_str(&content, format, path)
}

/// Parse sample pairs from a string (useful for testing).
///
/// Every vector is validated; one invalid vector rejects the whole file.
pub fn parse_sample_str(
    content: &str,
    format: SampleFormat,
    source_path: &Path,
) -> Result<Vec<SamplePair>> {
    let parsed: SampleFile = match format {
        SampleFormat::Toml => toml::from_str(content)
            .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?,
        SampleFormat::Json => serde_json::from_str(content)
            .with_context(|| format!("failed to parse JSON: {}", source_path.display()))?,
    };

    if parsed.samples.is_empty() {
        anyhow::bail!("no samples in {}", source_path.display());
    }
    for sample in &parsed.samples {
        sample
            .validate()
            .with_context(|| format!("sample '{}' in {}", sample.id, source_path.display()))?;
    }
    Ok(parsed.samples)
}

/// Recursively load all `.toml` and `.json` sample files from a directory.
///
/// Files that fail to parse are logged and skipped.
pub fn load_sample_directory(dir: &Path) -> Result<Vec<SamplePair>> {
    let mut samples = Vec::new();

    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    let mut entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort_by_key(|entry| entry.path());

    for entry in entries {
        let path = entry.path();

        if path.is_dir() {
            samples.extend(load_sample_directory(&path)?);
        } else if SampleFormat::from_path(&path).is_some() {
            match parse_sample(&path) {
                Ok(pairs) => samples.extend(pairs),
                Err(e) => {
                    tracing::warn!("skipping {}: {:#}", path.display(), e);
                }
            }
        }
    }

    Ok(samples)
}

/// A warning from sample validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The sample ID (if applicable).
    pub sample_id: Option<String>,
    /// Warning message.
    pub message: String,
}

/// Check one sample for measurements that parse but will produce odd scores.
pub fn validate_sample(sample: &SamplePair) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();
    let mut warn = |message: String| {
        warnings.push(ValidationWarning {
            sample_id: Some(sample.id.clone()),
            message,
        })
    };

    if sample.reference.transcription.trim().is_empty()
        && sample.user.transcription.trim().is_empty()
    {
        warn("both transcriptions are empty; clarity will always be perfect".into());
    }

    if sample.reference.total_duration == 0.0 {
        warn("reference total_duration is zero; duration differences will saturate".into());
    }

    for (side, vector) in [("reference", &sample.reference), ("user", &sample.user)] {
        if let Some(message) = ratio_mismatch(vector) {
            warn(format!("{side}: {message}"));
        }
        if vector.speaking_duration > vector.total_duration {
            warn(format!(
                "{side}: speaking_duration ({}) exceeds total_duration ({})",
                vector.speaking_duration, vector.total_duration
            ));
        }
    }

    warnings
}

fn ratio_mismatch(vector: &FeatureVector) -> Option<String> {
    if vector.total_duration <= 0.0 {
        return None;
    }
    let implied = vector.speaking_duration / vector.total_duration;
    ((implied - vector.ratio).abs() > RATIO_TOLERANCE).then(|| {
        format!(
            "ratio {} disagrees with speaking_duration / total_duration = {implied:.2}",
            vector.ratio
        )
    })
}

/// Validate a set of samples, including duplicate IDs across the set.
pub fn validate_samples(samples: &[SamplePair]) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    let mut seen_ids = HashSet::new();
    for sample in samples {
        if !seen_ids.insert(&sample.id) {
            warnings.push(ValidationWarning {
                sample_id: Some(sample.id.clone()),
                message: format!("duplicate sample ID: {}", sample.id),
            });
        }
    }

    for sample in samples {
        warnings.extend(validate_sample(sample));
    }

    warnings
}
