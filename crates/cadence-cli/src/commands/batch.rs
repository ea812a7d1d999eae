//! The `cadence batch` command.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use comfy_table::{Cell, Table};

use cadence_core::engine::ProgressReporter;
use cadence_core::report::{Assessment, EvaluationReport};
use cadence_providers::config::load_config_from;

use super::{build_engine, load_samples, FeedbackArgs};

/// Console progress reporter.
struct ConsoleReporter;

impl ProgressReporter for ConsoleReporter {
    fn on_sample_start(&self, sample_id: &str) {
        eprintln!("  Starting: {sample_id}");
    }

    fn on_sample_complete(&self, assessment: &Assessment) {
        let feedback = match &assessment.feedback {
            Some(outcome) if outcome.is_fallback() => " feedback FALLBACK",
            Some(_) => " feedback OK",
            None => "",
        };
        eprintln!(
            "  Done: {} total {}/100 [{}]{}",
            assessment.sample_id,
            assessment.evaluation.scores.total_score,
            assessment.label,
            feedback,
        );
    }

    fn on_sample_error(&self, sample_id: &str, error: &str) {
        eprintln!("  ERROR: {sample_id}: {error}");
    }

    fn on_batch_complete(&self, total: usize, completed: usize, failed: usize, elapsed: Duration) {
        eprintln!(
            "\nComplete: {completed}/{total} assessed, {failed} failed ({:.1}s)",
            elapsed.as_secs_f64()
        );
    }
}

pub async fn execute(
    samples_path: PathBuf,
    feedback: FeedbackArgs,
    parallelism: Option<usize>,
    output: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let mut config = load_config_from(config_path.as_deref())?;
    if let Some(parallelism) = parallelism {
        anyhow::ensure!(parallelism >= 1, "parallelism must be at least 1");
        config.parallelism = parallelism;
    }
    let output = output.unwrap_or_else(|| config.output_dir.clone());

    let samples = load_samples(&samples_path)?;
    anyhow::ensure!(
        !samples.is_empty(),
        "no samples found in {}",
        samples_path.display()
    );

    let engine = build_engine(&config, &feedback)?;
    eprintln!(
        "cadence v{}: assessing {} samples (parallelism {}, feedback {})",
        env!("CARGO_PKG_VERSION"),
        samples.len(),
        config.parallelism,
        if engine.has_feedback() { "on" } else { "off" },
    );
    eprintln!();

    let report = engine.assess_batch(&samples, &ConsoleReporter).await;

    print_summary(&report);

    std::fs::create_dir_all(&output)?;
    let timestamp = chrono::Utc::now().format("%Y-%m-%dT%H%M%S");
    let path = output.join(format!("report-{timestamp}.json"));
    report.save_json(&path)?;
    eprintln!("Results saved to: {}", path.display());

    Ok(())
}

/// Print the per-sample table and batch summary.
pub fn print_summary(report: &EvaluationReport) {
    let mut table = Table::new();
    table.set_header(vec![
        "Sample",
        "Clarity",
        "Speed",
        "Articulation",
        "Rhythm",
        "Total",
        "Level",
        "Feedback",
    ]);

    for assessment in &report.assessments {
        let scores = &assessment.evaluation.scores;
        let feedback = match &assessment.feedback {
            Some(outcome) if outcome.is_fallback() => "fallback".to_string(),
            Some(outcome) => format!("ok ({} attempt(s))", outcome.attempts),
            None => "-".to_string(),
        };
        table.add_row(vec![
            Cell::new(&assessment.sample_id),
            Cell::new(scores.clarity_score),
            Cell::new(scores.speed_score),
            Cell::new(scores.articulation_score),
            Cell::new(scores.rhythm_score),
            Cell::new(scores.total_score),
            Cell::new(assessment.label),
            Cell::new(feedback),
        ]);
    }
    for failure in &report.failures {
        table.add_row(vec![
            Cell::new(&failure.sample_id),
            Cell::new("-"),
            Cell::new("-"),
            Cell::new("-"),
            Cell::new("-"),
            Cell::new("-"),
            Cell::new("invalid"),
            Cell::new(&failure.error),
        ]);
    }
    println!("{table}");

    let summary = &report.summary;
    println!(
        "Samples: {} assessed, {} failed",
        summary.sample_count, summary.failed_count
    );
    if summary.sample_count > 0 {
        let means = &summary.mean_scores;
        println!(
            "Mean scores: clarity {:.1}, speed {:.1}, articulation {:.1}, rhythm {:.1}, total {:.1}",
            means.clarity, means.speed, means.articulation, means.rhythm, means.total
        );
    }
    if let Some((low, high)) = summary.total_range {
        println!("Total range: {low}-{high}");
    }
    if !summary.label_distribution.is_empty() {
        let labels: Vec<String> = summary
            .label_distribution
            .iter()
            .map(|(label, count)| format!("{label} {count}"))
            .collect();
        println!("Levels: {}", labels.join(", "));
    }
    if summary.feedback_requested > 0 {
        println!(
            "Feedback: {} requested, {} fell back ({:.0}%)",
            summary.feedback_requested,
            summary.feedback_fallbacks,
            summary.fallback_rate() * 100.0
        );
    }
}
