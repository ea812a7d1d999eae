//! The `cadence evaluate` command.

use std::path::PathBuf;

use anyhow::Result;

use cadence_providers::config::load_config_from;

use super::{build_engine, load_samples, print_assessment, FeedbackArgs};

pub async fn execute(
    sample_path: PathBuf,
    sample_id: Option<String>,
    feedback: FeedbackArgs,
    json: bool,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let samples = load_samples(&sample_path)?;

    let sample = match &sample_id {
        Some(id) => samples
            .iter()
            .find(|s| &s.id == id)
            .ok_or_else(|| anyhow::anyhow!("no sample '{id}' in {}", sample_path.display()))?,
        None => match samples.as_slice() {
            [only] => only,
            _ => anyhow::bail!(
                "{} holds {} samples; pick one with --id",
                sample_path.display(),
                samples.len()
            ),
        },
    };

    let engine = build_engine(&config, &feedback)?;
    let assessment = engine.assess(sample).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&assessment)?);
    } else {
        print_assessment(&assessment, Some(sample));
    }

    Ok(())
}
