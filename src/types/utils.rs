//! Shared helpers for reading loosely-typed model output and trimming text inputs.

use serde_json::Value;

// =============================================================================
// JSON Field Extraction
// =============================================================================

/// Extract string from JSON value by key.
#[inline]
pub fn json_string(value: &Value, key: &str) -> Option<String> {
    value.get(key)?.as_str().map(String::from)
}

/// Extract string with default value.
#[inline]
pub fn json_string_or(value: &Value, key: &str, default: &str) -> String {
    json_string(value, key).unwrap_or_else(|| default.to_string())
}

/// Extract string array from JSON value by key, skipping non-string entries.
#[inline]
pub fn json_string_array(value: &Value, key: &str) -> Vec<String> {
    value
        .get(key)
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|s| s.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

/// Extract boolean with default. Models often answer `"yes"` or `"true"` as strings.
pub fn json_bool(value: &Value, key: &str, default: bool) -> bool {
    match value.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => true,
            "false" | "no" | "0" => false,
            _ => default,
        },
        Some(Value::Number(n)) => n.as_u64().map(|n| n != 0).unwrap_or(default),
        _ => default,
    }
}

/// Extract unsigned integer with default, accepting numeric strings.
pub fn json_u64(value: &Value, key: &str, default: u64) -> u64 {
    match value.get(key) {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(default),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(default),
        _ => default,
    }
}

// =============================================================================
// Text Truncation
// =============================================================================

/// Keep at most `max_words` whitespace-separated words, joined by single spaces.
///
/// Input within the limit is returned unchanged.
pub fn truncate_words(text: &str, max_words: usize) -> String {
    let mut words = text.split_whitespace();
    let kept: Vec<&str> = words.by_ref().take(max_words).collect();
    if words.next().is_none() {
        return text.to_string();
    }
    kept.join(" ")
}

/// Keep at most `max_chars` characters, never splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_bool_lenient() {
        let value = json!({"a": true, "b": "Yes", "c": "no", "d": 1, "e": "maybe"});
        assert!(json_bool(&value, "a", false));
        assert!(json_bool(&value, "b", false));
        assert!(!json_bool(&value, "c", true));
        assert!(json_bool(&value, "d", false));
        assert!(json_bool(&value, "e", true));
        assert!(!json_bool(&value, "missing", false));
    }

    #[test]
    fn test_json_u64_accepts_strings() {
        let value = json!({"n": 4, "s": " 7 ", "bad": "x"});
        assert_eq!(json_u64(&value, "n", 0), 4);
        assert_eq!(json_u64(&value, "s", 0), 7);
        assert_eq!(json_u64(&value, "bad", 3), 3);
    }

    #[test]
    fn test_truncate_words() {
        assert_eq!(truncate_words("one two  three", 5), "one two  three");
        assert_eq!(truncate_words("one two three four", 2), "one two");
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
}
