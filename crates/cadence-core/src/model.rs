//! Core data model types for cadence.
//!
//! A [`FeatureVector`] summarizes one recording. Vectors are always compared
//! in (reference, user) pairs describing the same passage.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::InputError;

/// Acoustic and transcript summary of a single recording.
///
/// Deserialization rejects unknown and missing keys, so a vector that reaches
/// the scorer always carries every metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeatureVector {
    /// Detected syllables.
    pub number_of_syllables: u32,
    /// Detected pauses and fillers.
    pub number_of_pauses: u32,
    /// Syllables per second, pauses included.
    pub speech_rate: f64,
    /// Syllables per second, pauses excluded.
    pub articulation_rate: f64,
    /// Seconds of actual speech.
    pub speaking_duration: f64,
    /// Seconds of audio, pauses included.
    pub total_duration: f64,
    /// `speaking_duration / total_duration`.
    pub ratio: f64,
    /// Transcript of the recording.
    pub transcription: String,
}

const RATIO_SLACK: f64 = 1e-6;

impl FeatureVector {
    /// Reject values no feature extractor should ever produce.
    pub fn validate(&self) -> Result<(), InputError> {
        for metric in Metric::ALL {
            let value = self.metric(metric);
            if !value.is_finite() {
                return Err(InputError::invalid(metric.as_str(), "must be finite"));
            }
            if value < 0.0 {
                return Err(InputError::invalid(
                    metric.as_str(),
                    format!("must not be negative, got {value}"),
                ));
            }
        }
        if self.ratio > 1.0 + RATIO_SLACK {
            return Err(InputError::invalid(
                "ratio",
                format!("must be within [0, 1], got {}", self.ratio),
            ));
        }
        Ok(())
    }

    /// Value of a numeric metric as `f64`.
    pub fn metric(&self, metric: Metric) -> f64 {
        match metric {
            Metric::NumberOfSyllables => f64::from(self.number_of_syllables),
            Metric::NumberOfPauses => f64::from(self.number_of_pauses),
            Metric::SpeechRate => self.speech_rate,
            Metric::ArticulationRate => self.articulation_rate,
            Metric::SpeakingDuration => self.speaking_duration,
            Metric::TotalDuration => self.total_duration,
            Metric::Ratio => self.ratio,
        }
    }

    /// Parse a vector from JSON, mapping serde failures to [`InputError`].
    pub fn from_json(json: &str) -> Result<Self, InputError> {
        let vector: FeatureVector =
            serde_json::from_str(json).map_err(|e| InputError::Malformed(e.to_string()))?;
        vector.validate()?;
        Ok(vector)
    }
}

/// The numeric metrics of a [`FeatureVector`].
///
/// `ALL` fixes the order used wherever metrics are laid out positionally,
/// such as the classifier's input row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    NumberOfSyllables,
    NumberOfPauses,
    SpeechRate,
    ArticulationRate,
    SpeakingDuration,
    TotalDuration,
    Ratio,
}

impl Metric {
    pub const ALL: [Metric; 7] = [
        Metric::NumberOfSyllables,
        Metric::NumberOfPauses,
        Metric::SpeechRate,
        Metric::ArticulationRate,
        Metric::SpeakingDuration,
        Metric::TotalDuration,
        Metric::Ratio,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Metric::NumberOfSyllables => "number_of_syllables",
            Metric::NumberOfPauses => "number_of_pauses",
            Metric::SpeechRate => "speech_rate",
            Metric::ArticulationRate => "articulation_rate",
            Metric::SpeakingDuration => "speaking_duration",
            Metric::TotalDuration => "total_duration",
            Metric::Ratio => "ratio",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "number_of_syllables" | "syllables" => Ok(Metric::NumberOfSyllables),
            "number_of_pauses" | "pauses" => Ok(Metric::NumberOfPauses),
            "speech_rate" => Ok(Metric::SpeechRate),
            "articulation_rate" => Ok(Metric::ArticulationRate),
            "speaking_duration" => Ok(Metric::SpeakingDuration),
            "total_duration" => Ok(Metric::TotalDuration),
            "ratio" => Ok(Metric::Ratio),
            other => Err(format!("unknown metric: {other}")),
        }
    }
}

/// A reference recording and a learner's attempt at the same passage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SamplePair {
    /// Identifier used in reports.
    pub id: String,
    /// Free-form description, e.g. the passage title.
    #[serde(default)]
    pub description: String,
    pub reference: FeatureVector,
    pub user: FeatureVector,
}

impl SamplePair {
    pub fn validate(&self) -> Result<(), InputError> {
        self.reference.validate()?;
        self.user.validate()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::FeatureVector;

    /// Reference recording used throughout the unit tests.
    pub fn reference() -> FeatureVector {
        FeatureVector {
            number_of_syllables: 6,
            number_of_pauses: 0,
            speech_rate: 2.0,
            articulation_rate: 2.0,
            speaking_duration: 5.6,
            total_duration: 6.0,
            ratio: 0.9,
            transcription: "life is not an exact science it is an art".into(),
        }
    }
}
