//! Weighted category scoring.
//!
//! Each category score is `clamp(round((1 - penalty) * 10), 0, 10)` where the
//! penalty is a weighted sum of capped absolute deviations. The total is the
//! sum of the four categories rescaled from 40 to 100, rounded half up.
//! Negative and positive differences penalize identically.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::difference::DifferenceVector;
use crate::error::EvalError;
use crate::model::Metric;

/// The four scored aspects of a performance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Clarity,
    Speed,
    Articulation,
    Rhythm,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Clarity,
        Category::Speed,
        Category::Articulation,
        Category::Rhythm,
    ];
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Clarity => write!(f, "clarity"),
            Category::Speed => write!(f, "speed"),
            Category::Articulation => write!(f, "articulation"),
            Category::Rhythm => write!(f, "rhythm"),
        }
    }
}

/// An input to a category penalty: the transcript deviation or one metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum WeightKey {
    Wer,
    Metric(Metric),
}

impl TryFrom<String> for WeightKey {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        if s.eq_ignore_ascii_case("wer") {
            return Ok(WeightKey::Wer);
        }
        s.parse::<Metric>().map(WeightKey::Metric)
    }
}

impl From<WeightKey> for String {
    fn from(key: WeightKey) -> Self {
        match key {
            WeightKey::Wer => "wer".to_string(),
            WeightKey::Metric(m) => m.as_str().to_string(),
        }
    }
}

/// Weights for one category, keyed by input.
pub type CategoryWeights = BTreeMap<WeightKey, f64>;

const WEIGHT_SUM_SLACK: f64 = 1e-6;

/// Versioned weight tables for all categories.
///
/// Missing sections fall back to the defaults of version 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub version: u32,
    pub clarity: CategoryWeights,
    pub speed: CategoryWeights,
    pub articulation: CategoryWeights,
    pub rhythm: CategoryWeights,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        use Metric::*;
        let table =
            |entries: &[(WeightKey, f64)]| -> CategoryWeights { entries.iter().copied().collect() };
        Self {
            version: 1,
            clarity: table(&[
                (WeightKey::Wer, 0.8),
                (WeightKey::Metric(NumberOfSyllables), 0.2),
            ]),
            speed: table(&[
                (WeightKey::Metric(SpeechRate), 0.7),
                (WeightKey::Metric(SpeakingDuration), 0.15),
                (WeightKey::Metric(TotalDuration), 0.15),
            ]),
            articulation: table(&[
                (WeightKey::Metric(ArticulationRate), 0.8),
                (WeightKey::Metric(NumberOfSyllables), 0.2),
            ]),
            rhythm: table(&[
                (WeightKey::Metric(Ratio), 0.6),
                (WeightKey::Metric(NumberOfPauses), 0.4),
            ]),
        }
    }
}

impl ScoringConfig {
    pub fn weights(&self, category: Category) -> &CategoryWeights {
        match category {
            Category::Clarity => &self.clarity,
            Category::Speed => &self.speed,
            Category::Articulation => &self.articulation,
            Category::Rhythm => &self.rhythm,
        }
    }

    /// Every weight must be non-negative and each category must sum to 1,
    /// which keeps every category score within [0, 10] before clamping.
    pub fn validate(&self) -> Result<(), EvalError> {
        for category in Category::ALL {
            let weights = self.weights(category);
            if weights.is_empty() {
                return Err(EvalError::Config(format!(
                    "scoring v{}: {category} has no weights",
                    self.version
                )));
            }
            if let Some((key, w)) = weights.iter().find(|(_, w)| !w.is_finite() || **w < 0.0) {
                return Err(EvalError::Config(format!(
                    "scoring v{}: {category}.{} has invalid weight {w}",
                    self.version,
                    String::from(*key)
                )));
            }
            let sum: f64 = weights.values().sum();
            if (sum - 1.0).abs() > WEIGHT_SUM_SLACK {
                return Err(EvalError::Config(format!(
                    "scoring v{}: {category} weights sum to {sum}, expected 1",
                    self.version
                )));
            }
        }
        Ok(())
    }
}

/// Category and total scores for one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub clarity_score: u8,
    pub speed_score: u8,
    pub articulation_score: u8,
    #[serde(rename = "rythm_score", alias = "rhythm_score")]
    pub rhythm_score: u8,
    pub total_score: u8,
}

impl ScoreResult {
    pub fn category(&self, category: Category) -> u8 {
        match category {
            Category::Clarity => self.clarity_score,
            Category::Speed => self.speed_score,
            Category::Articulation => self.articulation_score,
            Category::Rhythm => self.rhythm_score,
        }
    }
}

/// Total out of 100 from four 0-10 category scores: `round_half_up(sum * 2.5)`.
pub fn total_score(categories: [u8; 4]) -> u8 {
    let sum: u32 = categories.iter().map(|c| u32::from(*c)).sum();
    ((sum * 5 + 1) / 2).min(100) as u8
}

/// Turns differences into scores using an injected [`ScoringConfig`].
#[derive(Debug, Clone)]
pub struct ScoreCalculator {
    config: ScoringConfig,
}

impl Default for ScoreCalculator {
    fn default() -> Self {
        Self {
            config: ScoringConfig::default(),
        }
    }
}

impl ScoreCalculator {
    pub fn new(config: ScoringConfig) -> Result<Self, EvalError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Weighted penalty of one category, in [0, 1] for a valid config.
    pub fn penalty(&self, category: Category, diff: &DifferenceVector, clarity_deviation: f64) -> f64 {
        self.config
            .weights(category)
            .iter()
            .map(|(key, weight)| {
                let value = match key {
                    WeightKey::Wer => clarity_deviation,
                    WeightKey::Metric(m) => diff.get(*m),
                };
                // NaN never reaches here from validated vectors; treat it as maximal
                let capped = if value.is_nan() { 1.0 } else { value.abs().min(1.0) };
                capped * weight
            })
            .sum()
    }

    pub fn score(&self, diff: &DifferenceVector, clarity_deviation: f64) -> ScoreResult {
        let [clarity, speed, articulation, rhythm] =
            Category::ALL.map(|c| category_score(self.penalty(c, diff, clarity_deviation)));
        ScoreResult {
            clarity_score: clarity,
            speed_score: speed,
            articulation_score: articulation,
            rhythm_score: rhythm,
            total_score: total_score([clarity, speed, articulation, rhythm]),
        }
    }
}

fn category_score(penalty: f64) -> u8 {
    let raw = (1.0 - penalty) * 10.0;
    // absorb float noise (6.4999999999 from 0.35 penalties) before rounding half up
    let raw = (raw * 1e9).round() / 1e9;
    raw.round().clamp(0.0, 10.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::difference::compute_differences;
    use crate::model::{fixtures, FeatureVector};
    use crate::transcript::{clarity_deviation, DEFAULT_TOLERANCE};

    #[test]
    fn default_config_is_valid() {
        ScoringConfig::default().validate().unwrap();
    }

    #[test]
    fn identical_recordings_score_perfectly() {
        let r = fixtures::reference();
        let diff = compute_differences(&r, &r);
        let score = ScoreCalculator::default().score(&diff, 0.0);
        assert_eq!(
            score,
            ScoreResult {
                clarity_score: 10,
                speed_score: 10,
                articulation_score: 10,
                rhythm_score: 10,
                total_score: 100,
            }
        );
    }

    #[test]
    fn halved_speech_rate_scenario() {
        let reference = fixtures::reference();
        let user = FeatureVector {
            speech_rate: 1.0,
            ..reference.clone()
        };
        let diff = compute_differences(&reference, &user);
        let clarity = clarity_deviation(
            &reference.transcription,
            &user.transcription,
            DEFAULT_TOLERANCE,
        );
        assert_eq!(clarity, 0.0);

        let score = ScoreCalculator::default().score(&diff, clarity);
        assert_eq!(score.speed_score, 7);
        assert_eq!(score.clarity_score, 10);
        assert_eq!(score.articulation_score, 10);
        assert_eq!(score.rhythm_score, 10);
        assert_eq!(score.total_score, total_score([7, 10, 10, 10]));
        assert_eq!(score.total_score, 93);
    }

    #[test]
    fn sign_does_not_matter() {
        let calc = ScoreCalculator::default();
        let mut slower = DifferenceVector::new();
        slower.insert(Metric::SpeechRate, -0.4);
        let mut faster = DifferenceVector::new();
        faster.insert(Metric::SpeechRate, 0.4);
        assert_eq!(calc.score(&slower, 0.0), calc.score(&faster, 0.0));
    }

    #[test]
    fn scores_never_increase_as_a_metric_drifts() {
        let calc = ScoreCalculator::default();
        for metric in Metric::ALL {
            let mut last = calc.score(&DifferenceVector::new(), 0.0);
            for step in 1..=25 {
                let mut diff = DifferenceVector::new();
                diff.insert(metric, f64::from(step) * 0.05);
                let score = calc.score(&diff, 0.0);
                for category in Category::ALL {
                    assert!(score.category(category) <= last.category(category));
                    assert!(score.category(category) <= 10);
                }
                assert!(score.total_score <= last.total_score);
                assert!(score.total_score <= 100);
                last = score;
            }
        }
    }

    #[test]
    fn clarity_deviation_only_affects_clarity() {
        let calc = ScoreCalculator::default();
        let score = calc.score(&DifferenceVector::new(), 0.5);
        assert_eq!(score.clarity_score, 6);
        assert_eq!(score.speed_score, 10);
        let worst = calc.score(&DifferenceVector::new(), 3.0);
        assert_eq!(worst.clarity_score, 2);
    }

    #[test]
    fn maximal_differences_floor_at_zero() {
        let calc = ScoreCalculator::default();
        let diff: DifferenceVector = Metric::ALL.iter().map(|m| (*m, -1.0)).collect();
        let score = calc.score(&diff, 1.0);
        assert_eq!(score.total_score, 0);
        for category in Category::ALL {
            assert_eq!(score.category(category), 0);
        }
    }

    #[test]
    fn total_is_monotonic_and_bounded() {
        assert_eq!(total_score([0, 0, 0, 0]), 0);
        assert_eq!(total_score([10, 10, 10, 10]), 100);
        assert_eq!(total_score([1, 0, 0, 0]), 3);
        let mut last = 0;
        for sum in 0..=40u8 {
            let parts = [
                sum.min(10),
                sum.saturating_sub(10).min(10),
                sum.saturating_sub(20).min(10),
                sum.saturating_sub(30),
            ];
            let t = total_score(parts);
            assert!(t >= last);
            last = t;
        }
    }

    #[test]
    fn config_rejects_bad_weights() {
        let mut config = ScoringConfig::default();
        config.speed.insert(WeightKey::Metric(Metric::SpeechRate), 0.9);
        assert!(matches!(config.validate(), Err(EvalError::Config(_))));

        let mut config = ScoringConfig::default();
        config.rhythm.clear();
        assert!(ScoreCalculator::new(config).is_err());
    }

    #[test]
    fn config_parses_from_toml_with_partial_override() {
        let toml_str = r#"
version = 2

[rhythm]
ratio = 0.7
number_of_pauses = 0.3
"#;
        let config: ScoringConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.version, 2);
        assert_eq!(config.rhythm[&WeightKey::Metric(Metric::Ratio)], 0.7);
        assert_eq!(config.speed, ScoringConfig::default().speed);
        config.validate().unwrap();
    }

    #[test]
    fn config_rejects_unknown_weight_key() {
        let toml_str = r#"
[clarity]
wer = 0.9
pitch = 0.1
"#;
        assert!(toml::from_str::<ScoringConfig>(toml_str).is_err());
    }

    #[test]
    fn score_result_uses_wire_key_for_rhythm() {
        let score = ScoreCalculator::default().score(&DifferenceVector::new(), 0.0);
        let json = serde_json::to_value(score).unwrap();
        assert_eq!(json["rythm_score"], 10);
    }
}
