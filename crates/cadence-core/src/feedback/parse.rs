//! Turning generated text into a [`FeedbackResult`].
//!
//! Two parsers are available: a JSON path that parses the outermost object
//! as-is and only runs the repair pipeline when that fails, and a markdown path that reads
//! `**Category**` headings followed by bullet lines. The configured
//! [`ResponseFormat`] picks which one runs first; the other is tried when the
//! first finds nothing.

use serde_json::{Map, Value};

use super::repair::{extract_outer_object, repair};
use super::{tip_key, FeedbackResult, TIPS_PER_CATEGORY, TIP_ORDER};
use crate::error::ParseError;
use crate::scoring::Category;
use crate::traits::ResponseFormat;

/// A parsed response. Every key is present in `feedback`; categories the
/// response did not mention are listed in `missing` and left empty.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFeedback {
    pub feedback: FeedbackResult,
    pub missing: Vec<Category>,
}

impl ParsedFeedback {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

type Parser = fn(&str) -> Result<ParsedFeedback, ParseError>;

/// Parse a response in the expected format, falling back to the other parser.
pub fn parse_feedback(raw: &str, format: ResponseFormat) -> Result<ParsedFeedback, ParseError> {
    if raw.trim().is_empty() {
        return Err(ParseError::Empty);
    }
    let (primary, secondary): (Parser, Parser) = if format.is_json() {
        (parse_json_feedback, parse_markdown_feedback)
    } else {
        (parse_markdown_feedback, parse_json_feedback)
    };
    match primary(raw) {
        Ok(parsed) => Ok(parsed),
        Err(err) => secondary(raw).map_err(|_| err),
    }
}

/// Read the four tip lists from the JSON object in the text, repairing it
/// first if it does not parse as written.
pub fn parse_json_feedback(raw: &str) -> Result<ParsedFeedback, ParseError> {
    let as_written =
        extract_outer_object(raw).and_then(|object| serde_json::from_str::<Value>(&object).ok());
    let value = match as_written {
        Some(value) => value,
        None => serde_json::from_str::<Value>(&repair(raw)?)?,
    };
    let Value::Object(object) = value else {
        return Err(ParseError::NotAnObject);
    };

    let object = match find_tips_object(&object) {
        Some(object) => object,
        None => return Err(ParseError::NoCategories),
    };

    let mut feedback = FeedbackResult::default();
    let mut missing = Vec::new();
    for category in TIP_ORDER {
        match lookup(object, category) {
            Some(value) => *feedback.tips_mut(category) = sentences(value),
            None => missing.push(category),
        }
    }
    Ok(ParsedFeedback { feedback, missing })
}

// Some models wrap the lists one level down, e.g. {"feedback": {...}}.
fn find_tips_object(object: &Map<String, Value>) -> Option<&Map<String, Value>> {
    if TIP_ORDER.iter().any(|&c| lookup(object, c).is_some()) {
        return Some(object);
    }
    object.values().find_map(|value| match value {
        Value::Object(inner) if TIP_ORDER.iter().any(|&c| lookup(inner, c).is_some()) => {
            Some(inner)
        }
        _ => None,
    })
}

fn lookup(object: &Map<String, Value>, category: Category) -> Option<&Value> {
    object.get(tip_key(category)).or_else(|| match category {
        Category::Rhythm => object.get("rhythm_tip"),
        _ => None,
    })
}

fn sentences(value: &Value) -> Vec<String> {
    let items: Vec<String> = match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        Value::String(s) => vec![s.trim().to_string()],
        _ => Vec::new(),
    };
    items
        .into_iter()
        .filter(|s| !s.is_empty())
        .take(TIPS_PER_CATEGORY)
        .collect()
}

/// Read `**Category**` (or `## Category`, `Category:`) headings and the
/// bullet lines under each.
pub fn parse_markdown_feedback(raw: &str) -> Result<ParsedFeedback, ParseError> {
    let mut feedback = FeedbackResult::default();
    let mut seen: Vec<Category> = Vec::new();
    let mut current: Option<Category> = None;

    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some((category, inline)) = heading(line) {
            if !seen.contains(&category) {
                seen.push(category);
            }
            current = Some(category);
            if let Some(text) = inline {
                push_tip(&mut feedback, category, text);
            }
            continue;
        }
        if let Some(category) = current {
            push_tip(&mut feedback, category, strip_bullet(line));
        }
    }

    if seen.is_empty() {
        return Err(ParseError::NoCategories);
    }
    let missing = TIP_ORDER
        .into_iter()
        .filter(|c| !seen.contains(c))
        .collect();
    Ok(ParsedFeedback { feedback, missing })
}

fn push_tip(feedback: &mut FeedbackResult, category: Category, text: &str) {
    let text = text.trim();
    let tips = feedback.tips_mut(category);
    if !text.is_empty() && tips.len() < TIPS_PER_CATEGORY {
        tips.push(text.to_string());
    }
}

/// A heading line and any text that follows it on the same line, as in
/// `- **Speed**: slow down a little`.
fn heading(line: &str) -> Option<(Category, Option<&str>)> {
    let bulleted = strip_bullet(line);
    let is_bullet = bulleted.len() != line.len();
    let line = bulleted;

    if let Some(rest) = line.strip_prefix("**") {
        let end = rest.find("**")?;
        let category = category_for_label(&rest[..end])?;
        let inline = rest[end + 2..].trim_start_matches([':', ' ', '-']).trim();
        return Some((category, (!inline.is_empty()).then_some(inline)));
    }
    if line.starts_with('#') {
        let label = line.trim_start_matches('#');
        return category_for_label(label).map(|c| (c, None));
    }
    match line.strip_suffix(':') {
        Some(label) if !is_bullet => category_for_label(label).map(|c| (c, None)),
        _ => None,
    }
}

fn category_for_label(label: &str) -> Option<Category> {
    let label = label
        .trim_matches(|c: char| c.is_whitespace() || matches!(c, '*' | '_' | ':' | '#'))
        .to_lowercase();
    if label.is_empty() || label.split_whitespace().count() > 4 {
        return None;
    }
    if label.contains("speed") || label.contains("pace") || label.contains("tempo") {
        Some(Category::Speed)
    } else if label.contains("clarity") || label.contains("clear") {
        Some(Category::Clarity)
    } else if label.contains("articulation") {
        Some(Category::Articulation)
    } else if label.contains("rhythm") || label.contains("rythm") {
        Some(Category::Rhythm)
    } else {
        None
    }
}

fn strip_bullet(line: &str) -> &str {
    let line = line.trim();
    for marker in ["- ", "* ", "• ", "+ "] {
        if let Some(rest) = line.strip_prefix(marker) {
            return rest.trim_start();
        }
    }
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix(". ").or_else(|| rest.strip_prefix(") ")) {
            return rest.trim_start();
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMPLETE: &str = r#"{"speed_tip":["You spoke a little slower than the original audio.","Try to pick up the pace slightly.","Your overall timing was close."],"clarity_tip":["Your words were clear.","Keep pronouncing each word fully.","Nice work on the ending."],"articulation_tip":["You formed sounds at a similar pace.","Keep your mouth relaxed.","Good control overall."],"rythm_tip":["You paused where the original audio paused.","Keep your pauses short.","Your flow felt natural."]}"#;

    #[test]
    fn complete_json_is_returned_verbatim() {
        let parsed = parse_feedback(COMPLETE, ResponseFormat::Json).unwrap();
        assert!(parsed.is_complete());
        let expected: FeedbackResult = serde_json::from_str(COMPLETE).unwrap();
        assert_eq!(parsed.feedback, expected);
    }

    #[test]
    fn valid_json_with_typographic_quotes_is_kept() {
        let raw = r#"{"speed_tip":["You said “science” a little fast.","Slow down on «exact».","Keep going."],"clarity_tip":["a"],"articulation_tip":["b"],"rythm_tip":["c"]}"#;
        let parsed = parse_feedback(raw, ResponseFormat::Json).unwrap();
        assert!(parsed.is_complete());
        let expected: FeedbackResult = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.feedback, expected);
        assert_eq!(parsed.feedback.speed_tip[0], "You said “science” a little fast.");
    }

    #[test]
    fn curly_quoted_keys_still_need_repair() {
        let raw = "Sure! {“speed_tip”: [“a”], “clarity_tip”: [“b”], “articulation_tip”: [“c”], “rythm_tip”: [“d”],}";
        let parsed = parse_json_feedback(raw).unwrap();
        assert!(parsed.is_complete());
        assert_eq!(parsed.feedback.rhythm_tip, vec!["d"]);
    }

    #[test]
    fn missing_keys_are_synthesized_and_reported() {
        let raw = r#"{"speed_tip": ["Slow down."], "clarity_tip": ["Be clear."]}"#;
        let parsed = parse_json_feedback(raw).unwrap();
        assert_eq!(parsed.missing, vec![Category::Articulation, Category::Rhythm]);
        assert!(parsed.feedback.articulation_tip.is_empty());
        assert!(parsed.feedback.rhythm_tip.is_empty());
        assert_eq!(parsed.feedback.speed_tip, vec!["Slow down."]);
    }

    #[test]
    fn long_lists_are_truncated() {
        let raw = r#"{"speed_tip": ["a", "b", "c", "d", "e"], "clarity_tip": "only one",
            "articulation_tip": [], "rhythm_tip": ["", "  x  "]}"#;
        let parsed = parse_json_feedback(raw).unwrap();
        assert_eq!(parsed.feedback.speed_tip, vec!["a", "b", "c"]);
        assert_eq!(parsed.feedback.clarity_tip, vec!["only one"]);
        assert_eq!(parsed.feedback.rhythm_tip, vec!["x"]);
        assert!(parsed.is_complete());
    }

    #[test]
    fn nested_object_is_found() {
        let raw = r#"{"feedback": {"speed_tip": ["a"], "clarity_tip": ["b"],
            "articulation_tip": ["c"], "rythm_tip": ["d"]}}"#;
        assert!(parse_json_feedback(raw).unwrap().is_complete());
    }

    #[test]
    fn unrelated_json_is_rejected() {
        assert!(matches!(
            parse_json_feedback(r#"{"answer": 42}"#),
            Err(ParseError::NoCategories)
        ));
        assert!(matches!(
            parse_json_feedback("{not json at all: ]"),
            Err(ParseError::Json(_))
        ));
    }

    #[test]
    fn empty_response_is_an_error() {
        assert!(matches!(
            parse_feedback("   \n", ResponseFormat::Json),
            Err(ParseError::Empty)
        ));
    }

    #[test]
    fn markdown_headings_and_bullets() {
        let raw = "Here is some feedback for you.\n\n\
            **Speed**\n\
            - You were a bit slow.\n\
            - Try to speed up.\n\n\
            **Clarity tips:**\n\
            1. Your words were clear.\n\n\
            ## Articulation\n\
            * Good sound control.\n\n\
            Rhythm:\n\
            • Pause less often.\n\
            • Keep a steady flow.\n\
            • Breathe between phrases.\n\
            • This fourth line is dropped.\n";
        let parsed = parse_markdown_feedback(raw).unwrap();
        assert!(parsed.is_complete());
        assert_eq!(
            parsed.feedback.speed_tip,
            vec!["You were a bit slow.", "Try to speed up."]
        );
        assert_eq!(parsed.feedback.clarity_tip, vec!["Your words were clear."]);
        assert_eq!(parsed.feedback.articulation_tip, vec!["Good sound control."]);
        assert_eq!(parsed.feedback.rhythm_tip.len(), 3);
    }

    #[test]
    fn markdown_inline_heading_text() {
        let raw = "- **Speed**: Slow down a little.\n- **Rhythm** - Pause less.";
        let parsed = parse_markdown_feedback(raw).unwrap();
        assert_eq!(parsed.feedback.speed_tip, vec!["Slow down a little."]);
        assert_eq!(parsed.feedback.rhythm_tip, vec!["Pause less."]);
        assert_eq!(parsed.missing, vec![Category::Clarity, Category::Articulation]);
    }

    #[test]
    fn format_selects_parser_and_falls_back() {
        let markdown = "**Speed**\n- a\n**Clarity**\n- b\n**Articulation**\n- c\n**Rhythm**\n- d";
        assert!(parse_feedback(markdown, ResponseFormat::Json)
            .unwrap()
            .is_complete());
        assert!(parse_feedback(COMPLETE, ResponseFormat::Markdown)
            .unwrap()
            .is_complete());
        assert!(matches!(
            parse_feedback("just prose", ResponseFormat::Json),
            Err(ParseError::NoObject)
        ));
    }

    #[test]
    fn prose_is_not_a_heading() {
        assert!(heading("Your speed was fine and you should keep going like that today.").is_none());
        assert!(heading("**Overall**").is_none());
        assert!(heading("- Keep a clear voice:").is_none());
        assert_eq!(heading("### Speed tips").map(|h| h.0), Some(Category::Speed));
    }
}
