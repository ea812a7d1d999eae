//! Evaluation engine.
//!
//! Wires scoring, classification and feedback together for single samples,
//! and fans batches out with bounded parallelism.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::classify::{ClassificationAdapter, SkillLabel};
use crate::difference::compute_differences;
use crate::error::EvalError;
use crate::feedback::{FeedbackOrchestrator, FeedbackOutcome, FeedbackResult, Terminal};
use crate::model::{FeatureVector, SamplePair};
use crate::report::{Assessment, Evaluation, EvaluationReport, SampleFailure};
use crate::scoring::ScoreCalculator;
use crate::statistics::compute_batch_summary;
use crate::transcript::{deviation_from_wer, word_error_rate, DEFAULT_TOLERANCE};

/// Configuration for the engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// WER below this is not counted against clarity.
    pub clarity_tolerance: f64,
    /// Maximum samples assessed concurrently in a batch.
    pub parallelism: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            clarity_tolerance: DEFAULT_TOLERANCE,
            parallelism: 4,
        }
    }
}

/// Progress reporting trait.
pub trait ProgressReporter: Send + Sync {
    fn on_sample_start(&self, sample_id: &str);
    fn on_sample_complete(&self, assessment: &Assessment);
    fn on_sample_error(&self, sample_id: &str, error: &str);
    fn on_batch_complete(&self, total: usize, completed: usize, failed: usize, elapsed: Duration);
}

/// No-op progress reporter.
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn on_sample_start(&self, _: &str) {}
    fn on_sample_complete(&self, _: &Assessment) {}
    fn on_sample_error(&self, _: &str, _: &str) {}
    fn on_batch_complete(&self, _: usize, _: usize, _: usize, _: Duration) {}
}

/// The evaluation engine. Holds no per-request state.
#[derive(Debug)]
pub struct CoachEngine {
    scorer: ScoreCalculator,
    classifier: Arc<ClassificationAdapter>,
    feedback: Option<FeedbackOrchestrator>,
    config: EngineConfig,
}

impl CoachEngine {
    pub fn new(
        scorer: ScoreCalculator,
        classifier: Arc<ClassificationAdapter>,
        config: EngineConfig,
    ) -> Result<Self, EvalError> {
        if !config.clarity_tolerance.is_finite() || config.clarity_tolerance < 0.0 {
            return Err(EvalError::Config(format!(
                "clarity_tolerance must be a non-negative number, got {}",
                config.clarity_tolerance
            )));
        }
        if config.parallelism == 0 {
            return Err(EvalError::Config("parallelism must be at least 1".into()));
        }
        Ok(Self {
            scorer,
            classifier,
            feedback: None,
            config,
        })
    }

    /// Enable feedback generation.
    pub fn with_feedback(mut self, orchestrator: FeedbackOrchestrator) -> Self {
        self.feedback = Some(orchestrator);
        self
    }

    pub fn has_feedback(&self) -> bool {
        self.feedback.is_some()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Differences, clarity and scores for one pair. Pure apart from logging.
    pub fn evaluate(
        &self,
        reference: &FeatureVector,
        user: &FeatureVector,
    ) -> Result<Evaluation, EvalError> {
        reference.validate()?;
        user.validate()?;

        let differences = compute_differences(reference, user);
        let wer = word_error_rate(&reference.transcription, &user.transcription);
        let clarity_deviation = deviation_from_wer(wer, self.config.clarity_tolerance);
        let scores = self.scorer.score(&differences, clarity_deviation);
        tracing::debug!(
            wer,
            clarity_deviation,
            total = scores.total_score,
            "evaluated sample"
        );

        Ok(Evaluation {
            differences,
            word_error_rate: wer,
            clarity_deviation,
            scores,
        })
    }

    pub fn classify(
        &self,
        reference: &FeatureVector,
        user: &FeatureVector,
    ) -> Result<SkillLabel, EvalError> {
        let evaluation = self.evaluate(reference, user)?;
        Ok(self.label(&evaluation))
    }

    /// Coaching feedback for one pair. Only invalid input is an error; with no
    /// generator configured the fallback is returned without any attempt.
    pub async fn feedback(
        &self,
        reference: &FeatureVector,
        user: &FeatureVector,
    ) -> Result<FeedbackOutcome, EvalError> {
        let evaluation = self.evaluate(reference, user)?;
        match self.feedback_for(&evaluation).await {
            Some(outcome) => Ok(outcome),
            None => {
                tracing::warn!("no feedback generator configured");
                Ok(FeedbackOutcome {
                    feedback: FeedbackResult::fallback(),
                    attempts: 0,
                    terminal: Terminal::Fallback,
                })
            }
        }
    }

    /// Scores, label and (when configured) feedback for one sample.
    pub async fn assess(&self, sample: &SamplePair) -> Result<Assessment, EvalError> {
        let evaluation = self.evaluate(&sample.reference, &sample.user)?;
        let label = self.label(&evaluation);
        let feedback = self.feedback_for(&evaluation).await;
        Ok(Assessment {
            sample_id: sample.id.clone(),
            evaluation,
            label,
            feedback,
        })
    }

    /// Assess many samples concurrently, at most `parallelism` at a time.
    /// Invalid samples are recorded as failures; the batch always completes.
    pub async fn assess_batch(
        &self,
        samples: &[SamplePair],
        progress: &dyn ProgressReporter,
    ) -> EvaluationReport {
        let start = Instant::now();
        let run_id = Uuid::new_v4();
        let semaphore = Semaphore::new(self.config.parallelism);

        let mut futures = FuturesUnordered::new();
        for (index, sample) in samples.iter().enumerate() {
            let semaphore = &semaphore;
            futures.push(async move {
                let result = match semaphore.acquire().await {
                    Ok(_permit) => {
                        progress.on_sample_start(&sample.id);
                        self.assess(sample).await
                    }
                    Err(_) => Err(EvalError::Config("batch semaphore closed".into())),
                };
                (index, sample.id.as_str(), result)
            });
        }

        let mut assessments = Vec::with_capacity(samples.len());
        let mut failures = Vec::new();
        let total = futures.len();

        while let Some((index, sample_id, result)) = futures.next().await {
            match result {
                Ok(assessment) => {
                    progress.on_sample_complete(&assessment);
                    assessments.push((index, assessment));
                }
                Err(e) => {
                    tracing::error!("assessment failed for {sample_id}: {e}");
                    progress.on_sample_error(sample_id, &e.to_string());
                    failures.push(SampleFailure {
                        sample_id: sample_id.to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        let elapsed = start.elapsed();
        progress.on_batch_complete(total, assessments.len(), failures.len(), elapsed);
        tracing::info!(
            total,
            completed = assessments.len(),
            failed = failures.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "batch complete"
        );

        assessments.sort_by_key(|(index, _)| *index);
        let assessments: Vec<Assessment> = assessments.into_iter().map(|(_, a)| a).collect();
        let summary = compute_batch_summary(&assessments, failures.len());

        EvaluationReport {
            id: run_id,
            created_at: chrono::Utc::now(),
            scoring_version: self.scorer.config().version,
            generator: self.feedback.as_ref().map(|f| f.generator_name().to_string()),
            assessments,
            failures,
            summary,
            duration_ms: elapsed.as_millis() as u64,
        }
    }

    fn label(&self, evaluation: &Evaluation) -> SkillLabel {
        self.classifier
            .classify(&evaluation.differences, evaluation.clarity_deviation)
    }

    async fn feedback_for(&self, evaluation: &Evaluation) -> Option<FeedbackOutcome> {
        let orchestrator = self.feedback.as_ref()?;
        Some(
            orchestrator
                .run(&evaluation.differences, evaluation.clarity_deviation)
                .await,
        )
    }
}
