//! Redaction applied to every value the journal writes.

use serde_json::Value;

/// Key-name fragments whose values are always replaced.
const SENSITIVE_FRAGMENTS: &[&str] = &["token", "password", "secret", "key", "auth"];

/// Strings longer than this are truncated before write.
const MAX_STRING_LEN: usize = 256;

const PLACEHOLDER: &str = "[REDACTED]";

/// Recursively redact a value: fields whose key name contains a sensitive
/// fragment (case-insensitive) are replaced with a placeholder —
/// `Authorization` header values unconditionally so — and long strings are
/// truncated.
pub fn redact_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, inner) in map {
                if is_sensitive_key(key) {
                    out.insert(key.clone(), Value::String(PLACEHOLDER.to_string()));
                } else {
                    out.insert(key.clone(), redact_value(inner));
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(redact_value).collect()),
        Value::String(s) if s.chars().count() > MAX_STRING_LEN => {
            let truncated: String = s.chars().take(MAX_STRING_LEN).collect();
            Value::String(format!("{truncated}…"))
        }
        other => other.clone(),
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let lowered = key.to_lowercase();
    lowered == "authorization"
        || SENSITIVE_FRAGMENTS
            .iter()
            .any(|fragment| lowered.contains(fragment))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn sensitive_keys_are_replaced_recursively() {
        let value = json!({
            "headers": {
                "Authorization": "Bearer secret-XYZ",
                "X-API-Key": "k-123",
                "Accept": "application/json"
            },
            "body": {"password": "hunter2", "name": "ada"}
        });

        let redacted = redact_value(&value);
        assert_eq!(redacted["headers"]["Authorization"], json!("[REDACTED]"));
        assert_eq!(redacted["headers"]["X-API-Key"], json!("[REDACTED]"));
        assert_eq!(redacted["headers"]["Accept"], json!("application/json"));
        assert_eq!(redacted["body"]["password"], json!("[REDACTED]"));
        assert_eq!(redacted["body"]["name"], json!("ada"));
    }

    #[test]
    fn key_matching_is_case_insensitive() {
        let redacted = redact_value(&json!({"ApiToken": "t", "SECRET_VALUE": "s"}));
        assert_eq!(redacted["ApiToken"], json!("[REDACTED]"));
        assert_eq!(redacted["SECRET_VALUE"], json!("[REDACTED]"));
    }

    #[test]
    fn long_strings_are_truncated() {
        let long = "x".repeat(400);
        let redacted = redact_value(&json!({ "note": long }));
        let out = redacted["note"].as_str().unwrap();
        assert!(out.chars().count() <= MAX_STRING_LEN + 1);
        assert!(out.ends_with('…'));
    }

    #[test]
    fn arrays_and_scalars_pass_through() {
        let value = json!([1, "two", {"auth": "x"}]);
        let redacted = redact_value(&value);
        assert_eq!(redacted[0], json!(1));
        assert_eq!(redacted[1], json!("two"));
        assert_eq!(redacted[2]["auth"], json!("[REDACTED]"));
    }
}
