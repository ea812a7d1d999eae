//! The `cadence init` command.

use std::path::Path;

use anyhow::Result;

pub fn execute() -> Result<()> {
    // Create cadence.toml
    if Path::new("cadence.toml").exists() {
        println!("cadence.toml already exists, skipping.");
    } else {
        std::fs::write("cadence.toml", SAMPLE_CONFIG)?;
        println!("Created cadence.toml");
    }

    // Create example sample file
    std::fs::create_dir_all("samples")?;
    let example_path = Path::new("samples/example.toml");
    if example_path.exists() {
        println!("samples/example.toml already exists, skipping.");
    } else {
        std::fs::write(example_path, EXAMPLE_SAMPLES)?;
        println!("Created samples/example.toml");
    }

    println!("\nNext steps:");
    println!("  1. Set ARLIAI_API_KEY, or switch default_provider to \"local\" in cadence.toml");
    println!("  2. Run: cadence validate --samples samples/example.toml");
    println!("  3. Run: cadence evaluate --sample samples/example.toml --id slow-reading");
    println!("  4. Run: cadence batch --samples samples");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# cadence configuration

default_provider = "arli"
default_model = "Mistral-Nemo-12B-Instruct-2407"
# WER up to this value is not counted against clarity
clarity_tolerance = 0.10
parallelism = 4
output_dir = "./cadence-results"
# classifier_model = "models/skill-tree.json"

[providers.arli]
type = "completions"
api_key = "${ARLIAI_API_KEY}"
base_url = "https://api.arliai.com"

[providers.local]
type = "ollama"
base_url = "http://localhost:11434"

[providers.offline]
type = "mock"

[feedback]
temperature = 0.2
top_p = 0.7
top_k = 5
max_tokens = 600
# json, guided_json or markdown
response_format = "json"
max_attempts = 3
request_timeout_secs = 60
retry_delay_ms = 500

# Category weights; each category must sum to 1.
[scoring]
version = 1

[scoring.clarity]
wer = 0.8
number_of_syllables = 0.2

[scoring.speed]
speech_rate = 0.7
speaking_duration = 0.15
total_duration = 0.15

[scoring.articulation]
articulation_rate = 0.8
number_of_syllables = 0.2

[scoring.rhythm]
ratio = 0.6
number_of_pauses = 0.4
"#;

const EXAMPLE_SAMPLES: &str = r#"# Reference and learner measurements for the same passage.

[[samples]]
id = "slow-reading"
description = "Learner reads at half the reference speech rate"

[samples.reference]
number_of_syllables = 12
number_of_pauses = 1
speech_rate = 2.0
articulation_rate = 2.2
speaking_duration = 5.5
total_duration = 6.0
ratio = 0.92
transcription = "life is not an exact science it is an art"

[samples.user]
number_of_syllables = 12
number_of_pauses = 1
speech_rate = 1.0
articulation_rate = 2.2
speaking_duration = 5.5
total_duration = 6.0
ratio = 0.92
transcription = "life is not an exact science it is an art"

[[samples]]
id = "missed-words"
description = "Learner drops two words and pauses more often"

[samples.reference]
number_of_syllables = 12
number_of_pauses = 1
speech_rate = 2.0
articulation_rate = 2.2
speaking_duration = 5.5
total_duration = 6.0
ratio = 0.92
transcription = "life is not an exact science it is an art"

[samples.user]
number_of_syllables = 10
number_of_pauses = 3
speech_rate = 1.6
articulation_rate = 2.0
speaking_duration = 5.0
total_duration = 6.5
ratio = 0.77
transcription = "life is not exact science it an art"
"#;
