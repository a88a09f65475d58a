//! PII redaction and detection. Pure functions: nothing here logs or
//! persists what it sees.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

/// Replacement for redacted values.
pub const REDACTION_MARKER: &str = "[REDACTED]";

/// Field-name fragments that mark a value as sensitive, matched
/// case-insensitively as substrings.
const SENSITIVE_KEY_FRAGMENTS: &[&str] = &[
    "password",
    "secret",
    "token",
    "apikey",
    "api_key",
    "ssn",
    "card",
    "cvv",
    "pin",
    "email",
    "phone",
    "account",
    "passport",
    "credential",
    "authorization",
    "iban",
    "routing",
];

static PII_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // SSN-shaped
        r"\b\d{3}-\d{2}-\d{4}\b",
        // Card-shaped, separator groups of four
        r"\b(?:\d{4}[ -]){3}\d{4}\b",
        // Card-shaped, contiguous
        r"\b\d{13,19}\b",
        // Email-shaped
        r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}",
        // Phone-shaped (separators required, so it does not shadow the
        // card patterns)
        r"\b\(?\d{3}\)?[ .-]\d{3}[ .-]\d{4}\b",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Whether a field name matches the sensitivity denylist.
pub fn is_sensitive_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    SENSITIVE_KEY_FRAGMENTS
        .iter()
        .any(|fragment| key.contains(fragment))
}

/// Recursively redact any field whose name matches the denylist.
///
/// Arrays and nested objects are traversed; scalars pass through.
pub fn sanitize_for_logging(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, v)| {
                    let sanitized = if is_sensitive_key(key) {
                        Value::String(REDACTION_MARKER.to_string())
                    } else {
                        sanitize_for_logging(v)
                    };
                    (key.clone(), sanitized)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(sanitize_for_logging).collect()),
        other => other.clone(),
    }
}

/// Whether free text contains something shaped like raw PII.
pub fn contains_pii(text: &str) -> bool {
    PII_PATTERNS.iter().any(|pattern| pattern.is_match(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn redacts_matching_keys() {
        let sanitized = sanitize_for_logging(&json!({
            "guestName": "Dana",
            "cardNumber": "4111111111111111",
            "password": "hunter2",
        }));
        assert_eq!(sanitized["guestName"], "Dana");
        assert_eq!(sanitized["cardNumber"], REDACTION_MARKER);
        assert_eq!(sanitized["password"], REDACTION_MARKER);
    }

    #[test]
    fn key_match_is_case_insensitive_substring() {
        assert!(is_sensitive_key("CardNumber"));
        assert!(is_sensitive_key("guest_email_address"));
        assert!(is_sensitive_key("AUTHORIZATION"));
        assert!(!is_sensitive_key("roomNumber"));
    }

    #[test]
    fn recurses_into_nested_structures() {
        let sanitized = sanitize_for_logging(&json!({
            "booking": {
                "payment": { "cvv": "123" },
                "guests": [ { "phone": "555-123-4567", "name": "Ash" } ],
            },
        }));
        assert_eq!(sanitized["booking"]["payment"]["cvv"], REDACTION_MARKER);
        assert_eq!(sanitized["booking"]["guests"][0]["phone"], REDACTION_MARKER);
        assert_eq!(sanitized["booking"]["guests"][0]["name"], "Ash");
    }

    #[test]
    fn scalars_and_arrays_pass_through() {
        assert_eq!(sanitize_for_logging(&json!(42)), json!(42));
        assert_eq!(sanitize_for_logging(&json!([1, 2])), json!([1, 2]));
        assert_eq!(sanitize_for_logging(&json!(null)), json!(null));
    }

    #[test]
    fn detects_ssn_shapes() {
        assert!(contains_pii("ssn is 123-45-6789 ok"));
        assert!(!contains_pii("order 123-456"));
    }

    #[test]
    fn detects_card_shapes() {
        assert!(contains_pii("4111111111111111"));
        assert!(contains_pii("4111 1111 1111 1111"));
        assert!(contains_pii("4111-1111-1111-1111"));
        assert!(!contains_pii("room 401"));
    }

    #[test]
    fn detects_email_shapes() {
        assert!(contains_pii("reach me at dana@example.com please"));
        assert!(!contains_pii("dana at example dot com"));
    }

    #[test]
    fn detects_phone_shapes() {
        assert!(contains_pii("call (555) 123-4567"));
        assert!(contains_pii("call 555-123-4567"));
        assert!(!contains_pii("confirmation 12345"));
    }

    #[test]
    fn clean_text_is_clean() {
        assert!(!contains_pii("two nights, late checkout, sea view"));
    }
}
