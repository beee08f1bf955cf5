//! Forgiving JSON parsing for model output
//!
//! Accepted relaxations, on top of strict JSON:
//! - markdown code fences around the payload
//! - prose before or after the object
//! - unquoted identifier keys (`{name: "Anna"}`)
//! - single-quoted strings (`{'name': 'Anna'}`)
//! - trailing commas before `}` or `]`
//!
//! Nothing else is guessed at.

use regex_lite::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LenientJsonError {
    #[error("no JSON object found in text")]
    NoObject,
    #[error("invalid JSON after repair: {0}")]
    Invalid(#[from] serde_json::Error),
}

/// Parse the first JSON object found in `raw`.
pub fn parse_object(raw: &str) -> Result<Map<String, Value>, LenientJsonError> {
    let text = strip_code_fences(raw);

    let candidate = match first_balanced_object(&text) {
        Some(obj) => obj,
        None => greedy_object(&text).ok_or(LenientJsonError::NoObject)?,
    };
    parse_with_repair(candidate)
}

fn parse_with_repair(candidate: &str) -> Result<Map<String, Value>, LenientJsonError> {
    let value = match serde_json::from_str::<Value>(candidate) {
        Ok(v) => v,
        Err(_) => serde_json::from_str::<Value>(&repair(candidate))?,
    };
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(LenientJsonError::NoObject),
    }
}

/// Remove markdown fence lines (```` ``` ```` and ```` ```json ````).
pub fn strip_code_fences(raw: &str) -> String {
    raw.lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// The first `{...}` span with balanced braces, ignoring braces in strings.
pub fn first_balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escape_next = false;

    for (i, ch) in text[start..].char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match (quote, ch) {
            (Some(_), '\\') => escape_next = true,
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(ch),
            (None, '{') => depth += 1,
            (None, '}') => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&text[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Widest `{...}` span: first `{` to last `}`.
fn greedy_object(text: &str) -> Option<&str> {
    static GREEDY: OnceLock<Option<Regex>> = OnceLock::new();
    let re = GREEDY.get_or_init(|| Regex::new(r"(?s)\{.*\}").ok()).as_ref()?;
    re.find(text).map(|m| m.as_str())
}

/// Rewrite the accepted relaxations into strict JSON.
pub fn repair(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 16);
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        match ch {
            '"' => {
                // Copy a double-quoted string verbatim
                out.push(ch);
                i += 1;
                while i < chars.len() {
                    let c = chars[i];
                    out.push(c);
                    i += 1;
                    if c == '\\' {
                        if let Some(&next) = chars.get(i) {
                            out.push(next);
                            i += 1;
                        }
                    } else if c == '"' {
                        break;
                    }
                }
            }
            '\'' => {
                out.push('"');
                i += 1;
                while i < chars.len() {
                    let c = chars[i];
                    i += 1;
                    match c {
                        '\\' => match chars.get(i) {
                            Some('\'') => {
                                out.push('\'');
                                i += 1;
                            }
                            Some(&next) => {
                                out.push('\\');
                                out.push(next);
                                i += 1;
                            }
                            None => out.push('\\'),
                        },
                        '\'' => break,
                        '"' => out.push_str("\\\""),
                        _ => out.push(c),
                    }
                }
                out.push('"');
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(ch);
                }
                i += 1;
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let ident: String = chars[start..i].iter().collect();
                let next = chars[i..].iter().find(|c| !c.is_whitespace());
                if next == Some(&':') && !matches!(ident.as_str(), "true" | "false" | "null") {
                    out.push('"');
                    out.push_str(&ident);
                    out.push('"');
                } else {
                    out.push_str(&ident);
                }
            }
            _ => {
                out.push(ch);
                i += 1;
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_json_passes_through() {
        let obj = parse_object(r#"{"characters": [{"name": "Anna"}]}"#).unwrap();
        assert_eq!(obj["characters"][0]["name"], "Anna");
    }

    #[test]
    fn code_fences_and_prose_are_ignored() {
        let raw = "Here is the extraction:\n```json\n{\"events\": [\"She ran\"]}\n```\nHope this helps!";
        let obj = parse_object(raw).unwrap();
        assert_eq!(obj["events"][0], "She ran");
    }

    #[test]
    fn braces_inside_strings_do_not_end_the_object() {
        let raw = r#"{"summary": "a } b { c"} trailing {junk}"#;
        let obj = parse_object(raw).unwrap();
        assert_eq!(obj["summary"], "a } b { c");
    }

    #[test]
    fn unquoted_keys_single_quotes_and_trailing_commas_are_repaired() {
        let raw = "{characters: [{'name': 'Anna', emotion: \"Miserable\",},], ok: true,}";
        let obj = parse_object(raw).unwrap();
        assert_eq!(obj["characters"][0]["name"], "Anna");
        assert_eq!(obj["characters"][0]["emotion"], "Miserable");
        assert_eq!(obj["ok"], true);
    }

    #[test]
    fn single_quoted_strings_keep_inner_double_quotes() {
        let raw = r#"{'description': 'She said "no"'}"#;
        let obj = parse_object(raw).unwrap();
        assert_eq!(obj["description"], "She said \"no\"");
    }

    #[test]
    fn apostrophes_inside_double_quotes_survive() {
        let raw = r#"{"description": "Anna's match", name: "x",}"#;
        let obj = parse_object(raw).unwrap();
        assert_eq!(obj["description"], "Anna's match");
    }

    #[test]
    fn unbalanced_text_falls_back_to_widest_span() {
        assert_eq!(greedy_object("x {a} y {b} z"), Some("{a} y {b}"));

        // The opening brace never closes at depth zero
        let raw = r#"{ {"events": []}"#;
        assert!(first_balanced_object(raw).is_none());
        assert!(matches!(parse_object(raw), Err(LenientJsonError::Invalid(_))));
    }

    #[test]
    fn no_object_is_an_error() {
        assert!(matches!(
            parse_object("I could not find any entities."),
            Err(LenientJsonError::NoObject)
        ));
        assert!(matches!(parse_object("{name: }"), Err(LenientJsonError::Invalid(_))));
    }
}
