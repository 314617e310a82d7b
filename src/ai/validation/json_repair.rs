//! JSON Extraction and Repair
//!
//! Turns free-form model output into a parsed JSON value.
//!
//! Handles common model output issues:
//! - `<think>...</think>` reasoning preambles
//! - Markdown code fence wrapping (```json ... ```)
//! - JSON embedded in explanatory prose
//! - Invalid backslash escapes (regexes, Windows paths, LaTeX)
//! - Trailing commas
//!
//! Extraction is deterministic and idempotent on valid JSON.

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

/// Top-level JSON container expected from the model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuredShape {
    Object,
    Array,
}

impl StructuredShape {
    fn delimiters(self) -> (char, char) {
        match self {
            Self::Object => ('{', '}'),
            Self::Array => ('[', ']'),
        }
    }
}

impl std::fmt::Display for StructuredShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Object => write!(f, "object"),
            Self::Array => write!(f, "array"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    #[error("no JSON delimiters found in model output")]
    NoDelimiters,

    #[error("model output is not valid JSON: {reason}")]
    ParseFailed { reason: String },
}

// =============================================================================
// Entry Points
// =============================================================================

/// Extract and parse a JSON value of the given shape from model output
pub fn extract_structured(raw: &str, shape: StructuredShape) -> Result<Value, ExtractionError> {
    let cleaned = preprocess(raw);
    let (open, close) = shape.delimiters();
    let span = slice_delimited(&cleaned, open, close).ok_or(ExtractionError::NoDelimiters)?;
    parse_span(span)
}

/// Extract whichever container (object or array) opens first in the output
pub fn extract_structured_auto(raw: &str) -> Result<Value, ExtractionError> {
    let cleaned = preprocess(raw);
    let shape = match (cleaned.find('{'), cleaned.find('[')) {
        (Some(obj), Some(arr)) if arr < obj => StructuredShape::Array,
        (Some(_), _) => StructuredShape::Object,
        (None, Some(_)) => StructuredShape::Array,
        (None, None) => return Err(ExtractionError::NoDelimiters),
    };
    let (open, close) = shape.delimiters();
    let span = slice_delimited(&cleaned, open, close).ok_or(ExtractionError::NoDelimiters)?;
    parse_span(span)
}

fn preprocess(raw: &str) -> String {
    let without_reasoning = strip_reasoning(raw);
    let trimmed = without_reasoning.trim().trim_start_matches('\u{feff}');
    strip_code_fences(trimmed).to_string()
}

fn parse_span(span: &str) -> Result<Value, ExtractionError> {
    let repaired = repair_escapes(span);
    if repaired.len() != span.len() {
        debug!(
            added = repaired.len() - span.len(),
            "Repaired invalid escape sequences"
        );
    }

    match serde_json::from_str::<Value>(&repaired) {
        Ok(value) => Ok(value),
        Err(first_err) => {
            let without_commas = fix_trailing_commas(&repaired);
            if without_commas.len() == repaired.len() {
                return Err(ExtractionError::ParseFailed {
                    reason: first_err.to_string(),
                });
            }
            serde_json::from_str::<Value>(&without_commas)
                .inspect(|_| warn!("JSON parsed after removing trailing commas"))
                .map_err(|e| ExtractionError::ParseFailed {
                    reason: e.to_string(),
                })
        }
    }
}

// =============================================================================
// Cleanup Steps
// =============================================================================

/// Remove every closed `<think>...</think>` block
pub fn strip_reasoning(raw: &str) -> String {
    const OPEN: &str = "<think>";
    const CLOSE: &str = "</think>";

    let mut result = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(start) = rest.find(OPEN) {
        let after_open = &rest[start + OPEN.len()..];
        let Some(end) = after_open.find(CLOSE) else {
            break;
        };
        result.push_str(&rest[..start]);
        rest = &after_open[end + CLOSE.len()..];
    }

    result.push_str(rest);
    result
}

/// Strip a leading fence with optional language tag and a trailing fence
pub fn strip_code_fences(s: &str) -> &str {
    let mut result = s.trim();

    if let Some(after_fence) = result.strip_prefix("```") {
        let tag_len = after_fence
            .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '+')))
            .unwrap_or(after_fence.len());
        result = &after_fence[tag_len..];
    }

    if let Some(before_fence) = result.strip_suffix("```") {
        result = before_fence;
    }

    result.trim()
}

/// Slice from the first `open` to the last `close`, inclusive
pub fn slice_delimited(s: &str, open: char, close: char) -> Option<&str> {
    let start = s.find(open)?;
    let end = s.rfind(close)?;
    if end < start {
        return None;
    }
    Some(&s[start..end + close.len_utf8()])
}

/// Single left-to-right pass doubling every backslash that does not start a
/// legal JSON escape. `\uXXXX` with four hex digits is consumed as one unit.
pub fn repair_escapes(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut result = String::with_capacity(s.len() + 8);
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        if ch != '\\' {
            result.push(ch);
            i += 1;
            continue;
        }

        match chars.get(i + 1) {
            Some(&next) if matches!(next, '"' | '\\' | '/' | 'b' | 'f' | 'n' | 'r' | 't') => {
                result.push('\\');
                result.push(next);
                i += 2;
            }
            Some('u')
                if chars
                    .get(i + 2..i + 6)
                    .is_some_and(|hex| hex.iter().all(char::is_ascii_hexdigit)) =>
            {
                result.extend(&chars[i..i + 6]);
                i += 6;
            }
            _ => {
                result.push_str("\\\\");
                i += 1;
            }
        }
    }

    result
}

/// Remove commas directly preceding `]` or `}` outside of string literals
fn fix_trailing_commas(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut result = String::with_capacity(s.len());
    let mut in_string = false;
    let mut escape = false;

    for (i, &ch) in chars.iter().enumerate() {
        if escape {
            escape = false;
            result.push(ch);
            continue;
        }

        match ch {
            '\\' if in_string => escape = true,
            '"' => in_string = !in_string,
            ',' if !in_string => {
                let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
                if matches!(next, Some(']') | Some('}')) {
                    continue;
                }
            }
            _ => {}
        }

        result.push(ch);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_parse_valid_json() {
        let value = extract_structured(r#"{"key": "value"}"#, StructuredShape::Object).unwrap();
        assert_eq!(value, json!({"key": "value"}));
    }

    #[test]
    fn test_fenced_json_inside_prose() {
        let raw = "prefix ```json\n{\"a\":1}\n``` suffix";
        let value = extract_structured(raw, StructuredShape::Object).unwrap();
        assert_eq!(value, json!({"a": 1}));
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fences("{\"a\":1}"), "{\"a\":1}");
    }

    #[test]
    fn test_repairs_regex_backslashes() {
        let raw = r#"{"pattern": "regex: \s+\d", "note": "line1\nline2"}"#;
        let value = extract_structured(raw, StructuredShape::Object).unwrap();
        assert_eq!(value["pattern"], r"regex: \s+\d");
        assert_eq!(value["note"], "line1\nline2");
    }

    #[test]
    fn test_repair_keeps_unicode_escapes() {
        assert_eq!(repair_escapes(r#""\u00e9""#), r#""\u00e9""#);
        assert_eq!(repair_escapes(r#""\u00g9""#), r#""\\u00g9""#);
        assert_eq!(repair_escapes(r"\"), r"\\");
        assert_eq!(repair_escapes(r"\\s"), r"\\s");
    }

    #[test]
    fn test_strips_reasoning_block() {
        let raw = "<think>The user wants {json}. Let me think.</think>\n{\"answer\": 42}";
        let value = extract_structured(raw, StructuredShape::Object).unwrap();
        assert_eq!(value, json!({"answer": 42}));
    }

    #[test]
    fn test_unclosed_reasoning_block_kept() {
        assert_eq!(strip_reasoning("<think>still going"), "<think>still going");
    }

    #[test]
    fn test_array_shape() {
        let raw = "Here are your questions:\n[{\"question\": \"Q1\"}, {\"question\": \"Q2\"}]\nGood luck!";
        let value = extract_structured(raw, StructuredShape::Array).unwrap();
        assert_eq!(value.as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn test_auto_picks_first_opener() {
        assert!(extract_structured_auto("[1, 2]").unwrap().is_array());
        assert!(extract_structured_auto("x {\"a\": [1]}").unwrap().is_object());
    }

    #[test]
    fn test_no_delimiters() {
        assert_eq!(
            extract_structured("I cannot help with that.", StructuredShape::Object),
            Err(ExtractionError::NoDelimiters)
        );
        assert_eq!(
            extract_structured("} backwards {", StructuredShape::Object),
            Err(ExtractionError::NoDelimiters)
        );
    }

    #[test]
    fn test_parse_failed() {
        let result = extract_structured("{\"a\": }", StructuredShape::Object);
        assert!(matches!(result, Err(ExtractionError::ParseFailed { .. })));
    }

    #[test]
    fn test_fix_trailing_comma() {
        let raw = r#"{"files": [{"path": "a, ]"},], }"#;
        let value = extract_structured(raw, StructuredShape::Object).unwrap();
        assert_eq!(value["files"][0]["path"], "a, ]");
    }

    fn json_leaf() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(|n| json!(n)),
            "[a-zA-Z0-9 ,:{}\\[\\]\\\\\"\n]{0,16}".prop_map(Value::String),
        ]
    }

    fn json_value() -> impl Strategy<Value = Value> {
        json_leaf().prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::btree_map("[a-z]{1,6}", inner, 0..4)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    fn json_object() -> impl Strategy<Value = Value> {
        prop::collection::btree_map("[a-z]{1,6}", json_value(), 0..5)
            .prop_map(|m| Value::Object(m.into_iter().collect()))
    }

    proptest! {
        #[test]
        fn prop_valid_object_round_trips(value in json_object()) {
            let raw = serde_json::to_string(&value).unwrap();
            prop_assert_eq!(extract_structured(&raw, StructuredShape::Object).unwrap(), value);
        }

        #[test]
        fn prop_extraction_is_idempotent(value in json_object(), prose in "[a-zA-Z .!]{0,20}") {
            let raw = format!("{prose}\n```json\n{}\n```\n{prose}", serde_json::to_string_pretty(&value).unwrap());
            let once = extract_structured(&raw, StructuredShape::Object).unwrap();
            let twice = extract_structured(&serde_json::to_string(&once).unwrap(), StructuredShape::Object).unwrap();
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn prop_repair_is_stable_on_its_output(s in "[a-z\\\\\"un0-9]{0,24}") {
            let once = repair_escapes(&s);
            prop_assert_eq!(repair_escapes(&once), once);
        }
    }
}
