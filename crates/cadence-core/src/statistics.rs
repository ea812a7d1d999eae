//! Aggregate statistics over a batch of assessments.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::classify::SkillLabel;
use crate::report::Assessment;
use crate::scoring::Category;

/// Mean scores across a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeanScores {
    pub clarity: f64,
    pub speed: f64,
    pub articulation: f64,
    pub rhythm: f64,
    pub total: f64,
}

/// Aggregate statistics for a batch run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Samples assessed successfully.
    pub sample_count: usize,
    /// Samples rejected as invalid input.
    pub failed_count: usize,
    pub mean_scores: MeanScores,
    /// Lowest and highest total score seen.
    pub total_range: Option<(u8, u8)>,
    pub label_distribution: BTreeMap<SkillLabel, usize>,
    /// Assessments that requested feedback.
    pub feedback_requested: usize,
    /// Of those, how many ended in the fallback text.
    pub feedback_fallbacks: usize,
}

impl BatchSummary {
    /// Share of feedback requests that fell back, in [0, 1].
    pub fn fallback_rate(&self) -> f64 {
        if self.feedback_requested == 0 {
            0.0
        } else {
            self.feedback_fallbacks as f64 / self.feedback_requested as f64
        }
    }
}

/// Summarize a batch of assessments.
pub fn compute_batch_summary(assessments: &[Assessment], failed_count: usize) -> BatchSummary {
    let mut summary = BatchSummary {
        sample_count: assessments.len(),
        failed_count,
        ..BatchSummary::default()
    };
    if assessments.is_empty() {
        return summary;
    }

    let n = assessments.len() as f64;
    let mean = |f: &dyn Fn(&Assessment) -> u8| -> f64 {
        assessments.iter().map(|a| f64::from(f(a))).sum::<f64>() / n
    };
    summary.mean_scores = MeanScores {
        clarity: mean(&|a| a.evaluation.scores.category(Category::Clarity)),
        speed: mean(&|a| a.evaluation.scores.category(Category::Speed)),
        articulation: mean(&|a| a.evaluation.scores.category(Category::Articulation)),
        rhythm: mean(&|a| a.evaluation.scores.category(Category::Rhythm)),
        total: mean(&|a| a.evaluation.scores.total_score),
    };

    let totals = assessments.iter().map(|a| a.evaluation.scores.total_score);
    summary.total_range = totals
        .clone()
        .min()
        .zip(totals.max());

    for assessment in assessments {
        *summary
            .label_distribution
            .entry(assessment.label)
            .or_insert(0) += 1;
        if let Some(outcome) = &assessment.feedback {
            summary.feedback_requested += 1;
            if outcome.is_fallback() {
                summary.feedback_fallbacks += 1;
            }
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::difference::DifferenceVector;
    use crate::feedback::{FeedbackOutcome, FeedbackResult, Terminal};
    use crate::report::Evaluation;
    use crate::scoring::{total_score, ScoreResult};

    fn assessment(scores: [u8; 4], label: SkillLabel, fallback: Option<bool>) -> Assessment {
        Assessment {
            sample_id: "s".into(),
            evaluation: Evaluation {
                differences: DifferenceVector::new(),
                word_error_rate: 0.0,
                clarity_deviation: 0.0,
                scores: ScoreResult {
                    clarity_score: scores[0],
                    speed_score: scores[1],
                    articulation_score: scores[2],
                    rhythm_score: scores[3],
                    total_score: total_score(scores),
                },
            },
            label,
            feedback: fallback.map(|fell_back| FeedbackOutcome {
                feedback: if fell_back {
                    FeedbackResult::fallback()
                } else {
                    FeedbackResult::default()
                },
                attempts: 1,
                terminal: if fell_back {
                    Terminal::Fallback
                } else {
                    Terminal::Success
                },
            }),
        }
    }

    #[test]
    fn empty_batch() {
        let summary = compute_batch_summary(&[], 2);
        assert_eq!(summary.sample_count, 0);
        assert_eq!(summary.failed_count, 2);
        assert_eq!(summary.total_range, None);
        assert_eq!(summary.fallback_rate(), 0.0);
    }

    #[test]
    fn means_and_distribution() {
        let assessments = vec![
            assessment([10, 10, 10, 10], SkillLabel::Advanced, Some(false)),
            assessment([6, 8, 10, 4], SkillLabel::Intermediate, Some(true)),
            assessment([2, 3, 4, 5], SkillLabel::Advanced, None),
        ];
        let summary = compute_batch_summary(&assessments, 0);

        assert_eq!(summary.sample_count, 3);
        assert!((summary.mean_scores.clarity - 6.0).abs() < 1e-9);
        assert!((summary.mean_scores.rhythm - 19.0 / 3.0).abs() < 1e-9);
        // totals: 100, 70, 35
        assert!((summary.mean_scores.total - 205.0 / 3.0).abs() < 1e-9);
        assert_eq!(summary.total_range, Some((35, 100)));
        assert_eq!(summary.label_distribution[&SkillLabel::Advanced], 2);
        assert_eq!(summary.label_distribution[&SkillLabel::Intermediate], 1);
        assert!(!summary.label_distribution.contains_key(&SkillLabel::Beginner));
        assert_eq!(summary.feedback_requested, 2);
        assert_eq!(summary.feedback_fallbacks, 1);
        assert!((summary.fallback_rate() - 0.5).abs() < 1e-9);
    }
}
