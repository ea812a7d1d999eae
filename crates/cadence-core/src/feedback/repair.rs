//! Pure text transforms that make generated JSON parseable.
//!
//! [`repair`] composes them in a fixed order. It runs only after the text
//! failed to parse as written:
//! quote normalization, control-character removal, extraction of the
//! outermost object, single-quote conversion, trailing-comma removal.

use crate::error::ParseError;

/// Run the whole pipeline. Fails only when the text has no `{` at all.
pub fn repair(raw: &str) -> Result<String, ParseError> {
    let text = strip_control_chars(&normalize_quotes(raw));
    let object = extract_outer_object(&text).ok_or(ParseError::NoObject)?;
    Ok(strip_trailing_commas(&quote_single_quoted_strings(&object)))
}

/// Replace typographic quotes with their ASCII counterparts.
pub fn normalize_quotes(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' | '\u{2033}' | '\u{00AB}'
            | '\u{00BB}' => '"',
            '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' | '\u{2032}' => '\'',
            other => other,
        })
        .collect()
}

/// Turn line breaks and tabs into spaces and drop other control and
/// zero-width characters, which are invalid inside JSON strings.
pub fn strip_control_chars(text: &str) -> String {
    text.chars()
        .filter_map(|c| match c {
            '\n' | '\r' | '\t' => Some(' '),
            '\u{FEFF}' | '\u{200B}' | '\u{200C}' | '\u{200D}' => None,
            c if c.is_control() => None,
            c => Some(c),
        })
        .collect()
}

/// Slice out the outermost balanced `{...}`, ignoring prose around it.
///
/// A truncated object (e.g. generation stopped at a `}` stop sequence) is
/// closed: an open string is terminated and open brackets are closed in order.
pub fn extract_outer_object(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                stack.pop();
                if stack.is_empty() {
                    let end = start + offset + c.len_utf8();
                    return Some(text[start..end].to_string());
                }
            }
            _ => {}
        }
    }

    let mut closed = text[start..].trim_end().to_string();
    if in_string {
        if escaped {
            closed.pop();
        }
        closed.push('"');
    }
    while let Some(closer) = stack.pop() {
        closed.push(closer);
    }
    Some(closed)
}

/// Convert single-quoted strings to double-quoted ones.
///
/// Inside a single-quoted string an apostrophe only closes the string when
/// the next non-space character is structural (`,` `:` `]` `}`) or the text
/// ends, so contractions and possessives ("you're", "speakers' pace") stay
/// literal. Double quotes inside such strings are escaped.
pub fn quote_single_quoted_strings(text: &str) -> String {
    enum State {
        Outside,
        Double { escaped: bool },
        Single,
    }

    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut state = State::Outside;

    for (i, &c) in chars.iter().enumerate() {
        state = match state {
            State::Outside => match c {
                '"' => {
                    out.push('"');
                    State::Double { escaped: false }
                }
                '\'' => {
                    out.push('"');
                    State::Single
                }
                _ => {
                    out.push(c);
                    State::Outside
                }
            },
            State::Double { escaped } => {
                out.push(c);
                match c {
                    _ if escaped => State::Double { escaped: false },
                    '\\' => State::Double { escaped: true },
                    '"' => State::Outside,
                    _ => State::Double { escaped: false },
                }
            }
            State::Single => match c {
                '\'' if closes_string(&chars[i + 1..]) => {
                    out.push('"');
                    State::Outside
                }
                '"' => {
                    out.push_str("\\\"");
                    State::Single
                }
                _ => {
                    out.push(c);
                    State::Single
                }
            },
        };
    }

    if matches!(state, State::Single) {
        out.push('"');
    }
    out
}

fn closes_string(rest: &[char]) -> bool {
    match rest.iter().find(|c| !c.is_whitespace()) {
        None => true,
        Some(c) => matches!(c, ',' | ':' | ']' | '}'),
    }
}

/// Remove commas directly followed (modulo whitespace) by `]` or `}`.
pub fn strip_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            out.push(c);
            continue;
        }
        match c {
            '"' => in_string = true,
            ',' => {
                let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
                if matches!(next, Some(']') | Some('}')) {
                    continue;
                }
            }
            _ => {}
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_curly_quotes() {
        assert_eq!(
            normalize_quotes("\u{201C}speed_tip\u{201D}: [\u{201C}You\u{2019}re great\u{201D}]"),
            "\"speed_tip\": [\"You're great\"]"
        );
    }

    #[test]
    fn strips_control_characters() {
        assert_eq!(strip_control_chars("a\nb\tc\u{0007}d\u{FEFF}"), "a b cd");
    }

    #[test]
    fn extracts_object_from_prose() {
        let text = r#"Sure! Here is your feedback: {"a": ["x}"], "b": {"c": 1}} Hope it helps {"#;
        assert_eq!(
            extract_outer_object(text).unwrap(),
            r#"{"a": ["x}"], "b": {"c": 1}}"#
        );
        assert!(extract_outer_object("no object here").is_none());
    }

    #[test]
    fn closes_truncated_object() {
        let text = r#"{"speed_tip": ["one", "two", "thr"#;
        assert_eq!(
            extract_outer_object(text).unwrap(),
            r#"{"speed_tip": ["one", "two", "thr"]}"#
        );
        let stopped = r#"{"speed_tip": ["one"], "rythm_tip": ["two"]"#;
        assert_eq!(
            extract_outer_object(stopped).unwrap(),
            r#"{"speed_tip": ["one"], "rythm_tip": ["two"]}"#
        );
    }

    #[test]
    fn converts_single_quoted_strings_keeping_contractions() {
        let text = "{'speed_tip': ['You're doing well', 'The speakers' pace was calm', 'Say \"hi\"']}";
        assert_eq!(
            quote_single_quoted_strings(text),
            r#"{"speed_tip": ["You're doing well", "The speakers' pace was calm", "Say \"hi\""]}"#
        );
    }

    #[test]
    fn leaves_double_quoted_apostrophes_alone() {
        let text = r#"{"a": ["don't stop", "it's 'fine'"]}"#;
        assert_eq!(quote_single_quoted_strings(text), text);
    }

    #[test]
    fn strips_trailing_commas_outside_strings() {
        assert_eq!(
            strip_trailing_commas(r#"{"a": ["x", "y",], "b": "1, ]",}"#),
            r#"{"a": ["x", "y"], "b": "1, ]"}"#
        );
    }

    #[test]
    fn full_pipeline_produces_valid_json() {
        let raw = "Here you go:\n{\n  \u{201C}speed_tip\u{201D}: ['You\u{2019}re a bit slow', 'Try this', 'Keep going',],\n}\nThanks!";
        let repaired = repair(raw).unwrap();
        let value: serde_json::Value = serde_json::from_str(&repaired).unwrap();
        assert_eq!(value["speed_tip"][0], "You're a bit slow");
        assert_eq!(value["speed_tip"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn pipeline_without_object_fails() {
        assert!(matches!(repair("nothing useful"), Err(ParseError::NoObject)));
    }
}
