//! The `cadence show` command.

use std::path::PathBuf;

use anyhow::Result;

use cadence_core::report::EvaluationReport;

use super::batch::print_summary;
use super::print_assessment;

pub fn execute(report_path: PathBuf, sample_id: Option<String>) -> Result<()> {
    let report = EvaluationReport::load_json(&report_path)?;

    match sample_id {
        Some(id) => {
            let assessment = report
                .assessment(&id)
                .ok_or_else(|| anyhow::anyhow!("no sample '{id}' in report {}", report.id))?;
            print_assessment(assessment, None);
        }
        None => {
            println!(
                "Report {} ({}, scoring v{}, feedback by {})",
                report.id,
                report.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
                report.scoring_version,
                report.generator.as_deref().unwrap_or("none"),
            );
            print_summary(&report);
        }
    }

    Ok(())
}
