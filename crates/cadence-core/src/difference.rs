//! Signed, bounded per-metric differences between two recordings.
//!
//! Sign convention: a difference is negative when the learner has less of a
//! metric than the reference and positive when they have more. Magnitudes are
//! relative to the reference value and capped at 1.
//!
//! Values are stored unrounded. Rounding to two decimals happens only when a
//! vector is rendered for people or prompts (see [`DifferenceVector::rounded`]).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{FeatureVector, Metric};

/// Relative difference of `user` against `reference`, in [-1, 1].
///
/// - both zero: `0`
/// - zero reference, non-zero user: `±1` (maximal dissimilarity)
/// - otherwise: `sign(user - reference) * min(1, |reference - user| / |reference|)`
pub fn relative_diff(reference: f64, user: f64) -> f64 {
    if reference == 0.0 {
        return if user == 0.0 { 0.0 } else { user.signum() };
    }
    let magnitude = ((reference - user).abs() / reference.abs()).min(1.0);
    if user < reference {
        -magnitude
    } else {
        magnitude
    }
}

/// Per-metric differences between a reference and a user recording.
///
/// Metrics absent from the map read as `0.0`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DifferenceVector(BTreeMap<Metric, f64>);

impl DifferenceVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, metric: Metric) -> f64 {
        self.0.get(&metric).copied().unwrap_or(0.0)
    }

    pub fn insert(&mut self, metric: Metric, value: f64) {
        self.0.insert(metric, value);
    }

    pub fn iter(&self) -> impl Iterator<Item = (Metric, f64)> + '_ {
        self.0.iter().map(|(m, v)| (*m, *v))
    }

    /// Absolute values in [`Metric::ALL`] order, missing metrics as `0.0`.
    pub fn abs_row(&self) -> Vec<f64> {
        Metric::ALL.iter().map(|m| self.get(*m).abs()).collect()
    }

    /// Copy with every value rounded to `decimals` places.
    pub fn rounded(&self, decimals: i32) -> Self {
        Self(
            self.0
                .iter()
                .map(|(m, v)| (*m, round_to(*v, decimals)))
                .collect(),
        )
    }
}

impl FromIterator<(Metric, f64)> for DifferenceVector {
    fn from_iter<I: IntoIterator<Item = (Metric, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Compute the difference of every numeric metric. The transcription is
/// compared separately by [`crate::transcript`].
pub fn compute_differences(reference: &FeatureVector, user: &FeatureVector) -> DifferenceVector {
    Metric::ALL
        .iter()
        .map(|m| (*m, relative_diff(reference.metric(*m), user.metric(*m))))
        .collect()
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    let rounded = (value * factor).round() / factor;
    // avoid rendering "-0"
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures;

    #[test]
    fn identical_vectors_have_zero_difference() {
        let r = fixtures::reference();
        let diff = compute_differences(&r, &r);
        for metric in Metric::ALL {
            assert_eq!(diff.get(metric), 0.0, "{metric}");
        }
    }

    #[test]
    fn zero_reference_edge_cases() {
        assert_eq!(relative_diff(0.0, 0.0), 0.0);
        assert_eq!(relative_diff(0.0, 3.0), 1.0);
        assert_eq!(relative_diff(0.0, -3.0), -1.0);
    }

    #[test]
    fn sign_follows_user_relative_to_reference() {
        assert_eq!(relative_diff(2.0, 1.0), -0.5);
        assert_eq!(relative_diff(2.0, 3.0), 0.5);
    }

    #[test]
    fn magnitude_is_capped_at_one() {
        assert_eq!(relative_diff(2.0, 10.0), 1.0);
        assert_eq!(relative_diff(2.0, 0.0), -1.0);
    }

    #[test]
    fn magnitude_grows_with_distance() {
        let mut last = 0.0;
        for step in 1..=30 {
            let user = 4.0 + f64::from(step) * 0.25;
            let d = relative_diff(4.0, user);
            assert!((0.0..=1.0).contains(&d));
            assert!(d >= last);
            last = d;
        }
    }

    #[test]
    fn speech_rate_scenario() {
        let reference = fixtures::reference();
        let user = FeatureVector {
            speech_rate: 1.0,
            ..reference.clone()
        };
        let diff = compute_differences(&reference, &user);
        assert_eq!(diff.get(Metric::SpeechRate), -0.5);
        assert_eq!(diff.get(Metric::ArticulationRate), 0.0);
    }

    #[test]
    fn missing_metric_reads_as_zero() {
        let mut diff = DifferenceVector::new();
        diff.insert(Metric::Ratio, 0.3);
        assert_eq!(diff.get(Metric::SpeechRate), 0.0);
        assert_eq!(diff.abs_row(), vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.3]);
    }

    #[test]
    fn rounding_is_presentation_only() {
        let mut diff = DifferenceVector::new();
        diff.insert(Metric::SpeechRate, -0.33333);
        diff.insert(Metric::Ratio, -0.001);
        let rounded = diff.rounded(2);
        assert_eq!(rounded.get(Metric::SpeechRate), -0.33);
        assert_eq!(rounded.get(Metric::Ratio), 0.0);
        assert_eq!(diff.get(Metric::SpeechRate), -0.33333);
    }

    #[test]
    fn serializes_as_metric_map() {
        let mut diff = DifferenceVector::new();
        diff.insert(Metric::SpeechRate, -0.5);
        let json = serde_json::to_string(&diff).unwrap();
        assert_eq!(json, r#"{"speech_rate":-0.5}"#);
    }
}
