//! Assessment and report types with JSON persistence.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::classify::SkillLabel;
use crate::difference::DifferenceVector;
use crate::feedback::FeedbackOutcome;
use crate::scoring::ScoreResult;
use crate::statistics::BatchSummary;

/// Scores and the intermediate values they were computed from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Signed relative differences, unrounded.
    pub differences: DifferenceVector,
    pub word_error_rate: f64,
    pub clarity_deviation: f64,
    pub scores: ScoreResult,
}

/// Everything produced for one sample pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub sample_id: String,
    #[serde(flatten)]
    pub evaluation: Evaluation,
    pub label: SkillLabel,
    /// Absent when no feedback generator is configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<FeedbackOutcome>,
}

/// A sample that could not be assessed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleFailure {
    pub sample_id: String,
    pub error: String,
}

/// A complete batch report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Unique report identifier.
    pub id: Uuid,
    /// When the report was created.
    pub created_at: DateTime<Utc>,
    /// Version of the scoring weight table in use.
    pub scoring_version: u32,
    /// Name of the feedback backend, if feedback was requested.
    pub generator: Option<String>,
    /// Per-sample results, in input order.
    pub assessments: Vec<Assessment>,
    #[serde(default)]
    pub failures: Vec<SampleFailure>,
    /// Aggregate statistics.
    pub summary: BatchSummary,
    /// Total wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

impl EvaluationReport {
    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        let report: EvaluationReport =
            serde_json::from_str(&content).context("failed to parse report JSON")?;
        Ok(report)
    }

    pub fn assessment(&self, sample_id: &str) -> Option<&Assessment> {
        self.assessments.iter().find(|a| a.sample_id == sample_id)
    }
}
