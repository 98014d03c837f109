//! Integrity primitives: canonical serialization and content hashing.
//!
//! Every hash in this crate is computed over a canonical JSON form in which
//! object keys are sorted lexicographically at every nesting level, so the
//! same logical content always hashes identically regardless of how the
//! value was constructed. The digest is a tamper-evidence mechanism, not a
//! security boundary.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Rebuild a JSON value with object keys sorted at every nesting level.
fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> =
                map.iter().map(|(k, v)| (k.clone(), sort_keys(v))).collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

/// Serialize a JSON value in canonical form: keys sorted lexicographically
/// at every nesting level, no insignificant whitespace.
pub fn canonical_json(value: &Value) -> String {
    serde_json::to_string(&sort_keys(value)).unwrap_or_else(|_| "null".to_string())
}

/// SHA-256 over UTF-8 text, rendered as lowercase hexadecimal.
pub fn digest_hex(input: &str) -> String {
    format!("{:x}", Sha256::digest(input.as_bytes()))
}

/// Hash a structured value via its canonical serialization.
pub fn hash_value(value: &Value) -> String {
    digest_hex(&canonical_json(value))
}

/// Normalize an instant to the fixed textual form used inside hashed
/// payloads: RFC 3339 with millisecond precision and a `Z` suffix.
pub fn canonical_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Collapse internal whitespace runs and trim the ends.
///
/// Used to normalize prediction text before hashing so that incidental
/// formatting differences do not change the commitment.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonical_json_sorts_top_level_keys() {
        let a = json!({"b": 1, "a": 2});
        let b = json!({"a": 2, "b": 1});
        assert_eq!(canonical_json(&a), canonical_json(&b));
        assert_eq!(canonical_json(&a), r#"{"a":2,"b":1}"#);
    }

    #[test]
    fn test_canonical_json_sorts_nested_keys() {
        let a = json!({"outer": {"z": true, "a": false}, "list": [{"y": 1, "x": 2}]});
        let b = json!({"list": [{"x": 2, "y": 1}], "outer": {"a": false, "z": true}});
        assert_eq!(canonical_json(&a), canonical_json(&b));
    }

    #[test]
    fn test_canonical_json_preserves_array_order() {
        let value = json!([3, 1, 2]);
        assert_eq!(canonical_json(&value), "[3,1,2]");
    }

    #[test]
    fn test_digest_hex_is_lowercase_hex() {
        let digest = digest_hex("hello");
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(digest, digest.to_lowercase());
    }

    #[test]
    fn test_digest_hex_known_vector() {
        // SHA-256 of the empty string.
        assert_eq!(
            digest_hex(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_hash_value_is_order_independent() {
        let a = json!({"statement": "X causes Y", "confidence": 60});
        let b = json!({"confidence": 60, "statement": "X causes Y"});
        assert_eq!(hash_value(&a), hash_value(&b));
    }

    #[test]
    fn test_hash_value_differs_on_content_change() {
        let a = json!({"text": "We expect X"});
        let b = json!({"text": "We expect Y"});
        assert_ne!(hash_value(&a), hash_value(&b));
    }

    #[test]
    fn test_canonical_timestamp_fixed_form() {
        let ts = DateTime::parse_from_rfc3339("2026-01-02T03:04:05.678Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(canonical_timestamp(ts), "2026-01-02T03:04:05.678Z");
    }

    #[test]
    fn test_normalize_whitespace_trims_and_collapses() {
        assert_eq!(normalize_whitespace("  We expect X  "), "We expect X");
        assert_eq!(normalize_whitespace("a\t b\n\nc"), "a b c");
        assert_eq!(normalize_whitespace("   "), "");
    }
}
