//! Subcommands and the pieces they share.

pub mod batch;
pub mod evaluate;
pub mod init;
pub mod show;
pub mod validate;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use comfy_table::{Cell, Table};

use cadence_core::classify::ClassificationAdapter;
use cadence_core::engine::{CoachEngine, EngineConfig};
use cadence_core::feedback::{tip_key, FeedbackOrchestrator, TIP_ORDER};
use cadence_core::model::{Metric, SamplePair};
use cadence_core::parser;
use cadence_core::report::Assessment;
use cadence_core::scoring::{Category, ScoreCalculator};
use cadence_core::traits::ResponseFormat;
use cadence_providers::{create_provider, CadenceConfig};

/// Feedback-related flags shared by `evaluate` and `batch`.
pub struct FeedbackArgs {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub no_feedback: bool,
    pub format: Option<ResponseFormat>,
}

/// Load one sample file, or every sample file under a directory.
pub fn load_samples(path: &Path) -> Result<Vec<SamplePair>> {
    if path.is_dir() {
        parser::load_sample_directory(path)
    } else {
        parser::parse_sample(path)
    }
}

/// Build the engine described by `config`, attaching a feedback generator
/// unless feedback is disabled or no provider is configured.
pub fn build_engine(config: &CadenceConfig, args: &FeedbackArgs) -> Result<CoachEngine> {
    config.validate()?;

    let scorer = ScoreCalculator::new(config.scoring.clone())?;
    let classifier = Arc::new(match &config.classifier_model {
        Some(path) => ClassificationAdapter::load(path),
        None => ClassificationAdapter::unavailable(),
    });
    let engine_config = EngineConfig {
        clarity_tolerance: config.clarity_tolerance,
        parallelism: config.parallelism,
    };
    let engine = CoachEngine::new(scorer, classifier, engine_config)?;

    if args.no_feedback {
        return Ok(engine);
    }
    let Some(name) = args
        .provider
        .clone()
        .or_else(|| config.default_provider.clone())
    else {
        tracing::info!("no provider configured, skipping feedback");
        return Ok(engine);
    };

    let generator = create_provider(&name, config.provider(&name)?)?;
    let model = args.model.as_deref().unwrap_or(&config.default_model);
    let mut feedback_config = config.feedback.to_feedback_config(model);
    if let Some(format) = args.format {
        feedback_config.response_format = format;
    }
    tracing::debug!(provider = %name, model, "feedback enabled");

    Ok(engine.with_feedback(FeedbackOrchestrator::new(generator, feedback_config)))
}

/// Print scores, metric differences, label and tips for one assessment.
///
/// The raw measurements are only shown when the sample itself is at hand.
pub fn print_assessment(assessment: &Assessment, sample: Option<&SamplePair>) {
    let evaluation = &assessment.evaluation;

    println!("Sample: {}", assessment.sample_id);

    let mut scores = Table::new();
    scores.set_header(vec!["Category", "Score"]);
    for category in Category::ALL {
        scores.add_row(vec![
            Cell::new(category),
            Cell::new(format!("{}/10", evaluation.scores.category(category))),
        ]);
    }
    scores.add_row(vec![
        Cell::new("total"),
        Cell::new(format!("{}/100", evaluation.scores.total_score)),
    ]);
    println!("{scores}");

    let mut metrics = Table::new();
    match sample {
        Some(sample) => {
            metrics.set_header(vec!["Metric", "Reference", "You", "Difference"]);
            for metric in Metric::ALL {
                metrics.add_row(vec![
                    Cell::new(metric),
                    Cell::new(format!("{:.2}", sample.reference.metric(metric))),
                    Cell::new(format!("{:.2}", sample.user.metric(metric))),
                    Cell::new(format!("{:+.2}", evaluation.differences.get(metric))),
                ]);
            }
        }
        None => {
            metrics.set_header(vec!["Metric", "Difference"]);
            for metric in Metric::ALL {
                metrics.add_row(vec![
                    Cell::new(metric),
                    Cell::new(format!("{:+.2}", evaluation.differences.get(metric))),
                ]);
            }
        }
    }
    println!("{metrics}");

    println!(
        "Word error rate: {:.2} (clarity deviation {:.2})",
        evaluation.word_error_rate, evaluation.clarity_deviation
    );
    println!("Skill level: {}", assessment.label);

    let Some(outcome) = &assessment.feedback else {
        return;
    };
    if outcome.is_fallback() {
        eprintln!(
            "Warning: feedback generation failed after {} attempt(s)",
            outcome.attempts
        );
    }
    println!("\nFeedback:");
    for category in TIP_ORDER {
        let tips = outcome.feedback.tips(category);
        if tips.is_empty() {
            continue;
        }
        println!("  {}:", tip_key(category));
        for tip in tips {
            println!("    - {tip}");
        }
    }
}
