//! Redaction of sensitive context values

use serde_json::{Map, Value};

use crate::config::defaults::REDACTION_MARKER;

/// Whether `key` contains any of the sensitive patterns, ignoring case
pub fn is_sensitive_key(key: &str, patterns: &[String]) -> bool {
    let key = key.to_ascii_lowercase();
    patterns
        .iter()
        .any(|pattern| key.contains(&pattern.to_ascii_lowercase()))
}

/// Replace the values of sensitive keys with the redaction marker.
///
/// Applies recursively to nested objects and to objects inside arrays.
pub fn sanitize_context(context: Map<String, Value>, patterns: &[String]) -> Map<String, Value> {
    context
        .into_iter()
        .map(|(key, value)| {
            if is_sensitive_key(&key, patterns) {
                (key, Value::String(REDACTION_MARKER.to_string()))
            } else {
                (key, sanitize_value(value, patterns))
            }
        })
        .collect()
}

fn sanitize_value(value: Value, patterns: &[String]) -> Value {
    match value {
        Value::Object(map) => Value::Object(sanitize_context(map, patterns)),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| sanitize_value(item, patterns))
                .collect(),
        ),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::defaults::DEFAULT_SENSITIVE_KEYS;
    use serde_json::json;

    fn patterns() -> Vec<String> {
        DEFAULT_SENSITIVE_KEYS.iter().map(|s| s.to_string()).collect()
    }

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_redacts_matching_keys_case_insensitively() {
        let clean = sanitize_context(
            object(json!({"username": "john", "Password": "secret123", "authToken": "abc"})),
            &patterns(),
        );
        assert_eq!(clean["username"], "john");
        assert_eq!(clean["Password"], REDACTION_MARKER);
        assert_eq!(clean["authToken"], REDACTION_MARKER);
    }

    #[test]
    fn test_redacts_nested_objects_and_arrays() {
        let clean = sanitize_context(
            object(json!({
                "request": {"headers": {"Authorization": "Bearer x", "accept": "json"}},
                "users": [{"name": "a", "api_key": "k1"}, "plain"]
            })),
            &patterns(),
        );
        assert_eq!(clean["request"]["headers"]["Authorization"], REDACTION_MARKER);
        assert_eq!(clean["request"]["headers"]["accept"], "json");
        assert_eq!(clean["users"][0]["api_key"], REDACTION_MARKER);
        assert_eq!(clean["users"][0]["name"], "a");
        assert_eq!(clean["users"][1], "plain");
    }

    #[test]
    fn test_sensitive_key_replaces_whole_subtree() {
        let clean = sanitize_context(
            object(json!({"credentials": {"user": "a", "pass": "b"}})),
            &patterns(),
        );
        assert_eq!(clean["credentials"], REDACTION_MARKER);
    }
}
