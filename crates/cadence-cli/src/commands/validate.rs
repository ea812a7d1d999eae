//! The `cadence validate` command.

use std::path::PathBuf;

use anyhow::Result;

use cadence_core::parser::validate_samples;

use super::load_samples;

pub fn execute(samples_path: PathBuf) -> Result<()> {
    let samples = load_samples(&samples_path)?;
    println!("{}: {} sample(s)", samples_path.display(), samples.len());

    let warnings = validate_samples(&samples);
    for w in &warnings {
        let prefix = w
            .sample_id
            .as_ref()
            .map(|id| format!("  [{id}]"))
            .unwrap_or_else(|| "  ".to_string());
        println!("{prefix} WARNING: {}", w.message);
    }

    if warnings.is_empty() {
        println!("All samples valid.");
    } else {
        println!("\n{} warning(s) found.", warnings.len());
    }

    Ok(())
}
