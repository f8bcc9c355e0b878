//! Content fingerprints.
//!
//! A fingerprint is the lowercase hex SHA-256 of the canonical JSON of a
//! submission: object keys sorted recursively, no insignificant whitespace.
//! Field order in the payload therefore never changes the fingerprint.

use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

use crate::config::FingerprintPolicy;
use crate::models::RawSubmission;

/// Serialize a JSON value with recursively sorted object keys.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                if let Some(v) = map.get(key) {
                    write_canonical(v, out);
                }
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Hash raw bytes and return lowercase hex.
pub fn hash_bytes_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Hash the canonical form of a JSON value.
pub fn hash_canonical_json_hex(value: &Value) -> String {
    hash_bytes_hex(canonical_json(value).as_bytes())
}

/// Computes submission fingerprints according to a [`FingerprintPolicy`].
#[derive(Debug, Clone)]
pub struct Fingerprinter {
    ignored: BTreeSet<String>,
    authoritative: BTreeSet<String>,
}

impl Fingerprinter {
    pub fn new(policy: &FingerprintPolicy) -> Self {
        Self {
            ignored: policy.ignored_fields.iter().cloned().collect(),
            authoritative: policy.authoritative_fields.iter().cloned().collect(),
        }
    }

    /// Fingerprint a submission as submitted.
    ///
    /// `matched` strips the authoritative-governed fields, so organization
    /// edits to data it does not own never trigger a re-emit.
    pub fn fingerprint(&self, submission: &RawSubmission, matched: bool) -> Result<String, serde_json::Error> {
        let mut value = serde_json::to_value(submission)?;
        if let Value::Object(map) = &mut value {
            map.retain(|key, _| {
                !self.ignored.contains(key) && !(matched && self.authoritative.contains(key))
            });
        }
        Ok(hash_canonical_json_hex(&value))
    }

    /// Fingerprint of a consolidated record: digest of its sorted
    /// `organization:fingerprint` pairs.
    pub fn combine<'a>(parts: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
        let mut pairs: Vec<String> = parts
            .into_iter()
            .map(|(org, fp)| format!("{}:{}", org, fp))
            .collect();
        pairs.sort();
        hash_bytes_hex(pairs.join("\n").as_bytes())
    }
}

impl Default for Fingerprinter {
    fn default() -> Self {
        Self::new(&FingerprintPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn submission(value: Value) -> RawSubmission {
        RawSubmission::from_value("FB", value).unwrap()
    }

    #[test]
    fn test_canonical_json_sorts_nested_keys() {
        let value = json!({ "b": 1, "a": { "z": [ { "y": 1, "x": 2 } ], "c": null } });
        assert_eq!(canonical_json(&value), r#"{"a":{"c":null,"z":[{"x":2,"y":1}]},"b":1}"#);
    }

    #[test]
    fn test_hash_is_sha256_hex() {
        assert_eq!(
            hash_bytes_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_field_order_does_not_matter() {
        let fp = Fingerprinter::default();
        let a: Value = serde_json::from_str(r#"{"primaryId":"FB:FBrf01","title":"T","volume":"3"}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"volume":"3","title":"T","primaryId":"FB:FBrf01"}"#).unwrap();
        assert_eq!(
            fp.fingerprint(&submission(a), false).unwrap(),
            fp.fingerprint(&submission(b), false).unwrap()
        );
    }

    #[test]
    fn test_ignored_fields_never_count() {
        let fp = Fingerprinter::default();
        let a = submission(json!({ "primaryId": "FB:FBrf01", "citation": "old" }));
        let b = submission(json!({ "primaryId": "FB:FBrf01", "citation": "new", "keywords": ["x"] }));
        assert_eq!(fp.fingerprint(&a, false).unwrap(), fp.fingerprint(&b, false).unwrap());
    }

    #[test]
    fn test_governed_fields_stripped_only_when_matched() {
        let fp = Fingerprinter::default();
        let a = submission(json!({ "primaryId": "FB:FBrf01", "title": "Old" }));
        let b = submission(json!({ "primaryId": "FB:FBrf01", "title": "New" }));
        assert_ne!(fp.fingerprint(&a, false).unwrap(), fp.fingerprint(&b, false).unwrap());
        assert_eq!(fp.fingerprint(&a, true).unwrap(), fp.fingerprint(&b, true).unwrap());
    }

    #[test]
    fn test_combine_is_order_independent() {
        let one = Fingerprinter::combine(vec![("FB", "aa"), ("WB", "bb")]);
        let two = Fingerprinter::combine(vec![("WB", "bb"), ("FB", "aa")]);
        assert_eq!(one, two);
        assert_ne!(one, Fingerprinter::combine(vec![("FB", "aa"), ("WB", "cc")]));
    }

    proptest! {
        #[test]
        fn fingerprint_ignores_key_order(
            fields in proptest::collection::btree_map("[a-z]{1,8}", "[a-zA-Z0-9 ]{0,12}", 0..8),
        ) {
            let forward: serde_json::Map<String, Value> = fields
                .iter()
                .map(|(k, v)| (format!("x{}", k), json!(v)))
                .collect();
            let mut reversed_text = String::from("{");
            for (i, (k, v)) in fields.iter().rev().enumerate() {
                if i > 0 {
                    reversed_text.push(',');
                }
                reversed_text.push_str(&format!("\"x{}\":{}", k, json!(v)));
            }
            reversed_text.push('}');
            let reversed: Value = serde_json::from_str(&reversed_text).unwrap();

            prop_assert_eq!(
                hash_canonical_json_hex(&Value::Object(forward)),
                hash_canonical_json_hex(&reversed)
            );
        }
    }
}
