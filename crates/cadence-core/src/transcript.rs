//! Transcript comparison via Word Error Rate.

/// Default WER margin that is not held against the learner.
pub const DEFAULT_TOLERANCE: f64 = 0.10;

/// Split a transcript into comparable words: whitespace tokens, lower-cased,
/// with surrounding punctuation trimmed. Tokens that are only punctuation
/// are dropped.
fn words(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect()
}

/// Word-level edit distance (substitutions + insertions + deletions).
fn edit_distance(reference: &[String], hypothesis: &[String]) -> usize {
    // Single rolling row of the Levenshtein table.
    let mut row: Vec<usize> = (0..=hypothesis.len()).collect();
    for (i, r) in reference.iter().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, h) in hypothesis.iter().enumerate() {
            let substitution = diagonal + usize::from(r != h);
            let deletion = row[j + 1] + 1;
            let insertion = row[j] + 1;
            diagonal = row[j + 1];
            row[j + 1] = substitution.min(deletion).min(insertion);
        }
    }
    row[hypothesis.len()]
}

/// Word Error Rate of `hypothesis` against `reference`.
///
/// An empty reference yields `0.0` for an empty hypothesis and `1.0`
/// otherwise. The result may exceed `1.0` when the hypothesis has many
/// insertions.
pub fn word_error_rate(reference: &str, hypothesis: &str) -> f64 {
    let reference = words(reference);
    let hypothesis = words(hypothesis);
    if reference.is_empty() {
        return if hypothesis.is_empty() { 0.0 } else { 1.0 };
    }
    edit_distance(&reference, &hypothesis) as f64 / reference.len() as f64
}

/// WER minus `tolerance`, floored at zero.
pub fn clarity_deviation(reference: &str, hypothesis: &str, tolerance: f64) -> f64 {
    deviation_from_wer(word_error_rate(reference, hypothesis), tolerance)
}

/// [`clarity_deviation`] for an already computed WER.
pub fn deviation_from_wer(wer: f64, tolerance: f64) -> f64 {
    (wer - tolerance).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PASSAGE: &str = "life is not an exact science it is an art";

    #[test]
    fn identical_transcripts_have_no_deviation() {
        for tolerance in [0.0, 0.1, 0.5] {
            assert_eq!(clarity_deviation(PASSAGE, PASSAGE, tolerance), 0.0);
        }
        assert_eq!(clarity_deviation("", "", 0.0), 0.0);
    }

    #[test]
    fn counts_substitutions_insertions_deletions() {
        // one substitution out of ten words
        let sub = "life is not an exact science it is an arc";
        assert!((word_error_rate(PASSAGE, sub) - 0.1).abs() < 1e-12);

        // one deletion
        let del = "life is not an exact science it is art";
        assert!((word_error_rate(PASSAGE, del) - 0.1).abs() < 1e-12);

        // two insertions
        let ins = "well life is not an exact science it is an art indeed";
        assert!((word_error_rate(PASSAGE, ins) - 0.2).abs() < 1e-12);
    }

    #[test]
    fn case_and_punctuation_are_ignored() {
        let hyp = "Life is not an exact science. It is an art!";
        assert_eq!(word_error_rate(PASSAGE, hyp), 0.0);
    }

    #[test]
    fn tolerance_absorbs_small_errors() {
        let hyp = "life is not an exact science it is an arc";
        assert_eq!(clarity_deviation(PASSAGE, hyp, DEFAULT_TOLERANCE), 0.0);
        let hyp = "life is a exact science it is art";
        let dev = clarity_deviation(PASSAGE, hyp, DEFAULT_TOLERANCE);
        assert!((dev - 0.2).abs() < 1e-12, "got {dev}");
    }

    #[test]
    fn empty_reference() {
        assert_eq!(word_error_rate("", "something"), 1.0);
        assert_eq!(word_error_rate("", ""), 0.0);
    }

    #[test]
    fn empty_hypothesis_is_full_deletion() {
        assert_eq!(word_error_rate(PASSAGE, ""), 1.0);
    }
}
