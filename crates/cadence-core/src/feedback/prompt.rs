//! Prompt construction for the feedback generator.

use std::fmt::Write as _;

use crate::difference::{round_to, DifferenceVector};
use crate::model::Metric;
use crate::traits::ResponseFormat;

/// Decimal places shown to the generator.
const PROMPT_DECIMALS: i32 = 2;

/// Plain-language name of a metric as the generator sees it.
fn describe(metric: Metric) -> &'static str {
    match metric {
        Metric::NumberOfSyllables => "Syllables spoken",
        Metric::NumberOfPauses => "Number of pauses",
        Metric::SpeechRate => "Overall speaking pace",
        Metric::ArticulationRate => "Pace while actually speaking",
        Metric::SpeakingDuration => "Time spent speaking",
        Metric::TotalDuration => "Total recording length",
        Metric::Ratio => "Share of the recording spent speaking",
    }
}

const PERSONA: &str = "\
You are a friendly pronunciation coach helping someone who is learning English.
You compare how the learner said a phrase with the original audio and give them advice.
You receive a list of numbers describing how the learner differed from the original audio.";

const TIP_RULES: &str = "\
Every tip list must:
- contain exactly three complete, descriptive sentences, each one different;
- be written in the second person, with a warm and encouraging tone;
- open with one sentence describing how the learner did compared to the original audio;
- continue with one concrete suggestion of what to change and how;
- close with one piece of advice for future practice.

Also:
- Do not use technical vocabulary such as transcription, speech rate or metric.
- Never name the feedback categories inside the sentences.
- Call the model speaker \"the original audio\", never the reference.
- Do not suggest recording yourself, reading aloud or listening to native speakers.";

const SEVERITY_GUIDE: &str = "\
How to read the numbers:
- A value near 0 means the learner was very close to the original audio: praise them and keep tips gentle.
- A value around 0.3 in either direction is a noticeable difference: be encouraging and suggest small changes.
- A value beyond 0.6 in either direction is a large difference: give direct, specific advice.
- A positive value means the learner had more of that quality than the original audio.
- A negative value means the learner had less of it.
- Word mismatch ranges from 0 to 1: 0 means every word was understood, higher means harder to follow.";

const EXAMPLE_INPUT: &str = "\
- Syllables spoken: 0.0
- Number of pauses: 0.0
- Overall speaking pace: -0.6
- Pace while actually speaking: -0.2
- Time spent speaking: -0.3
- Total recording length: -1.0
- Share of the recording spent speaking: -0.4
- Word mismatch: 0.3";

const EXAMPLE_JSON: &str = r#"{"speed_tip":["You took noticeably more time than the original audio to get through the phrase.","Try moving from one word to the next a little sooner so the sentence keeps its momentum.","Practicing short phrases at a steady, comfortable pace will make a quicker delivery feel natural."],"clarity_tip":["Most of your words came through, though a few were hard to make out.","Give the end of each word its full sound before moving on.","Slowing down on tricky words first and then speeding up will help them stay clear."],"articulation_tip":["The way you shaped your sounds was fairly close to the original audio.","Open your mouth a bit more on the vowels so each sound is fully formed.","Warming up with a few tongue twisters can keep your sounds crisp."],"rythm_tip":["Your pauses were placed much like the original audio.","Keep the breaks between phrases short so the sentence flows as one idea.","Paying attention to where natural breaks fall will keep your delivery smooth."]}"#;

const EXAMPLE_MARKDOWN: &str = "\
**Speed**
- You took noticeably more time than the original audio to get through the phrase.
- Try moving from one word to the next a little sooner so the sentence keeps its momentum.
- Practicing short phrases at a steady, comfortable pace will make a quicker delivery feel natural.
**Clarity**
- Most of your words came through, though a few were hard to make out.
- Give the end of each word its full sound before moving on.
- Slowing down on tricky words first and then speeding up will help them stay clear.
**Articulation**
- The way you shaped your sounds was fairly close to the original audio.
- Open your mouth a bit more on the vowels so each sound is fully formed.
- Warming up with a few tongue twisters can keep your sounds crisp.
**Rhythm**
- Your pauses were placed much like the original audio.
- Keep the breaks between phrases short so the sentence flows as one idea.
- Paying attention to where natural breaks fall will keep your delivery smooth.";

fn output_rules(format: ResponseFormat) -> &'static str {
    match format {
        ResponseFormat::Json | ResponseFormat::GuidedJson => {
            "\
Answer with one minified JSON object on a single line, starting with { and ending with }.
- Do not add newlines, tabs or any text outside the object.
- The object must have exactly these keys: speed_tip, clarity_tip, articulation_tip, rythm_tip.
- Each key holds a list of strings in double quotes."
        }
        ResponseFormat::Markdown => {
            "\
Answer with exactly four sections, in this order: **Speed**, **Clarity**, **Articulation**, **Rhythm**.
- Put each heading in bold on its own line.
- Under each heading write one bullet line per sentence, starting with \"- \".
- Do not add any other text."
        }
    }
}

/// Build the generator prompt for one attempt.
///
/// Differences and the clarity deviation are rounded to two decimals here;
/// stored values stay unrounded.
pub fn build_prompt(
    diff: &DifferenceVector,
    clarity_deviation: f64,
    format: ResponseFormat,
) -> String {
    let mut prompt = String::with_capacity(4096);
    let _ = writeln!(prompt, "{PERSONA}\n");
    let _ = writeln!(prompt, "{}\n", output_rules(format));
    let _ = writeln!(prompt, "{TIP_RULES}\n");
    let _ = writeln!(prompt, "{SEVERITY_GUIDE}\n");

    prompt.push_str("Differences between the learner and the original audio:\n");
    for metric in Metric::ALL {
        let value = round_to(diff.get(metric), PROMPT_DECIMALS);
        let _ = writeln!(prompt, "- {}: {value}", describe(metric));
    }
    let _ = writeln!(
        prompt,
        "- Word mismatch: {}\n",
        round_to(clarity_deviation, PROMPT_DECIMALS)
    );

    let _ = writeln!(prompt, "Example input:\n{EXAMPLE_INPUT}\n");
    let example = match format {
        ResponseFormat::Markdown => EXAMPLE_MARKDOWN,
        ResponseFormat::Json | ResponseFormat::GuidedJson => EXAMPLE_JSON,
    };
    let _ = write!(prompt, "Example output:\n{example}\n\nYour answer:\n");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::parse::{parse_json_feedback, parse_markdown_feedback};

    fn diff() -> DifferenceVector {
        let mut diff = DifferenceVector::new();
        diff.insert(Metric::SpeechRate, -0.5);
        diff.insert(Metric::Ratio, 0.123456);
        diff.insert(Metric::NumberOfPauses, 1.0);
        diff
    }

    #[test]
    fn values_are_rounded_for_display() {
        let prompt = build_prompt(&diff(), 0.33333, ResponseFormat::Json);
        assert!(prompt.contains("- Overall speaking pace: -0.5\n"));
        assert!(prompt.contains("- Share of the recording spent speaking: 0.12\n"));
        assert!(prompt.contains("- Word mismatch: 0.33\n"));
        assert!(prompt.contains("- Syllables spoken: 0\n"));
    }

    #[test]
    fn raw_field_names_are_not_exposed() {
        let prompt = build_prompt(&diff(), 0.0, ResponseFormat::Json);
        for metric in Metric::ALL {
            assert!(
                !prompt.contains(metric.as_str()),
                "prompt leaks `{metric}`"
            );
        }
        assert!(prompt.contains("original audio"));
    }

    #[test]
    fn format_selects_output_section() {
        let json = build_prompt(&diff(), 0.0, ResponseFormat::GuidedJson);
        assert!(json.contains("rythm_tip"));
        assert!(!json.contains("**Rhythm**"));

        let markdown = build_prompt(&diff(), 0.0, ResponseFormat::Markdown);
        assert!(markdown.contains("**Rhythm**"));
        assert!(!markdown.contains("minified JSON"));
    }

    #[test]
    fn examples_are_parseable() {
        assert!(parse_json_feedback(EXAMPLE_JSON).unwrap().is_complete());
        assert!(parse_markdown_feedback(EXAMPLE_MARKDOWN)
            .unwrap()
            .is_complete());
    }
}
