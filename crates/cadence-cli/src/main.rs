//! cadence CLI: the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use cadence_core::traits::ResponseFormat;

mod commands;

#[derive(Parser)]
#[command(
    name = "cadence",
    version,
    about = "Spoken-performance scoring and coaching"
)]
struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score one sample pair and generate coaching tips
    Evaluate {
        /// Path to a .toml or .json sample file
        #[arg(long)]
        sample: PathBuf,

        /// Sample to evaluate when the file holds several
        #[arg(long)]
        id: Option<String>,

        /// Provider to generate feedback with (defaults to `default_provider`)
        #[arg(long)]
        provider: Option<String>,

        /// Model identifier passed to the provider
        #[arg(long)]
        model: Option<String>,

        /// Skip feedback generation
        #[arg(long)]
        no_feedback: bool,

        /// Expected response format: json, guided-json, markdown
        #[arg(long, value_parser = parse_format)]
        format: Option<ResponseFormat>,

        /// Print the assessment as JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Assess every sample in a file or directory and save a report
    Batch {
        /// Path to a sample file or directory
        #[arg(long)]
        samples: PathBuf,

        /// Provider to generate feedback with (defaults to `default_provider`)
        #[arg(long)]
        provider: Option<String>,

        /// Model identifier passed to the provider
        #[arg(long)]
        model: Option<String>,

        /// Skip feedback generation
        #[arg(long)]
        no_feedback: bool,

        /// Expected response format: json, guided-json, markdown
        #[arg(long, value_parser = parse_format)]
        format: Option<ResponseFormat>,

        /// Max concurrent assessments
        #[arg(long)]
        parallelism: Option<usize>,

        /// Output directory
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Check sample files for invalid or suspicious measurements
    Validate {
        /// Path to a sample file or directory
        #[arg(long)]
        samples: PathBuf,
    },

    /// Print a saved batch report
    Show {
        /// Report JSON written by `cadence batch`
        #[arg(long)]
        report: PathBuf,

        /// Show a single sample with its tips
        #[arg(long)]
        id: Option<String>,
    },

    /// Create starter config and example sample file
    Init,
}

fn parse_format(s: &str) -> Result<ResponseFormat, String> {
    match s.to_ascii_lowercase().replace('_', "-").as_str() {
        "json" => Ok(ResponseFormat::Json),
        "guided-json" | "guided" => Ok(ResponseFormat::GuidedJson),
        "markdown" | "md" => Ok(ResponseFormat::Markdown),
        other => Err(format!(
            "unknown format '{other}' (expected json, guided-json or markdown)"
        )),
    }
}

#[tokio::main]
async fn main() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("cadence=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config;

    let result = match cli.command {
        Commands::Evaluate {
            sample,
            id,
            provider,
            model,
            no_feedback,
            format,
            json,
        } => {
            let feedback = commands::FeedbackArgs {
                provider,
                model,
                no_feedback,
                format,
            };
            commands::evaluate::execute(sample, id, feedback, json, config).await
        }
        Commands::Batch {
            samples,
            provider,
            model,
            no_feedback,
            format,
            parallelism,
            output,
        } => {
            let feedback = commands::FeedbackArgs {
                provider,
                model,
                no_feedback,
                format,
            };
            commands::batch::execute(samples, feedback, parallelism, output, config).await
        }
        Commands::Validate { samples } => commands::validate::execute(samples),
        Commands::Show { report, id } => commands::show::execute(report, id),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_names() {
        assert_eq!(parse_format("json").unwrap(), ResponseFormat::Json);
        assert_eq!(parse_format("guided_json").unwrap(), ResponseFormat::GuidedJson);
        assert_eq!(parse_format("Guided-JSON").unwrap(), ResponseFormat::GuidedJson);
        assert_eq!(parse_format("md").unwrap(), ResponseFormat::Markdown);
        assert!(parse_format("yaml").is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
