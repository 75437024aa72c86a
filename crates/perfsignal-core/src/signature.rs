//! Signature identity: the content-addressed fingerprint (C1) and the
//! signature record itself (the non-hashing half of C2's data model).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

use crate::tristate::TriState;

/// A property value going into the fingerprint bag: either a bare string
/// (kept as-is) or anything else JSON-serializable (serialized with sorted
/// object keys before hashing). See `fingerprint` for why this distinction
/// matters bit-for-bit.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Str(String),
    Json(serde_json::Value),
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Str(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Str(value)
    }
}

impl From<serde_json::Value> for PropertyValue {
    fn from(value: serde_json::Value) -> Self {
        PropertyValue::Json(value)
    }
}

/// An ordered bag of named properties to be fingerprinted. `BTreeMap` just
/// gives callers a convenient deterministic builder; the hash itself does
/// not depend on this ordering (see below).
pub type PropertyMap = BTreeMap<String, PropertyValue>;

/// C1 — Signature Fingerprinter.
///
/// Collects property *names* and serialized property *values* into a single
/// bag, sorts the bag lexicographically (ASCII / byte order, which is what
/// `String`'s `Ord` gives us), concatenates with no separator, and hashes
/// the UTF-8 bytes with SHA-1.
///
/// Because names and values share one sorted bag, this is a compatibility
/// constant, not an implementation detail: changing it invalidates every
/// historical signature hash (§9).
pub fn fingerprint(properties: &PropertyMap) -> String {
    let mut bag: Vec<String> = Vec::with_capacity(properties.len() * 2);

    for key in properties.keys() {
        bag.push(key.clone());
    }
    for value in properties.values() {
        bag.push(match value {
            PropertyValue::Str(s) => s.clone(),
            PropertyValue::Json(v) => serialize_sorted(v),
        });
    }

    bag.sort();
    let joined = bag.concat();

    let mut hasher = Sha1::new();
    hasher.update(joined.as_bytes());
    hex::encode(hasher.finalize())
}

/// Serializes a `serde_json::Value` with object keys sorted, matching
/// Python's `json.dumps(value, sort_keys=True)`. `serde_json::Map` is
/// backed by a `BTreeMap` by default (no `preserve_order` feature in this
/// workspace), so plain `to_string` already yields sorted keys at every
/// nesting level.
fn serialize_sorted(value: &serde_json::Value) -> String {
    serde_json::to_string(value).expect("Value serialization is infallible")
}

/// External encoding of the alert-change-type knob. `null`/missing maps to
/// `Pct` (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertChangeType {
    Pct,
    Abs,
}

impl AlertChangeType {
    pub fn from_external(raw: Option<&str>) -> Option<AlertChangeType> {
        match raw {
            Some("pct") => Some(AlertChangeType::Pct),
            Some("abs") => Some(AlertChangeType::Abs),
            _ => None,
        }
    }
}

/// The identity tuple of a signature: `(repository, framework, application,
/// signature_hash)`. Unique per §3.
pub type SignatureKey = (String, String, String, String);

/// The content-addressed identity of a measured quantity (§3).
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    pub repository: String,
    pub framework: String,
    pub application: String,
    pub signature_hash: String,
    pub suite: String,
    pub suite_public_name: Option<String>,
    pub test: String,
    pub test_public_name: Option<String>,
    pub platform: String,
    pub option_collection: String,
    pub extra_options: String,
    pub tags: String,
    pub measurement_unit: Option<String>,
    pub lower_is_better: bool,
    pub has_subtests: bool,
    /// Weak reference to a summary signature's hash; null for summaries and
    /// for bare tests with no summary sibling.
    pub parent_signature: Option<String>,
    pub should_alert: TriState,
    pub monitor: TriState,
    pub alert_notify_emails: String,
    pub alert_change_type: Option<AlertChangeType>,
    pub alert_threshold: Option<f64>,
    pub min_back_window: Option<u32>,
    pub max_back_window: Option<u32>,
    pub fore_window: Option<u32>,
    pub last_updated: DateTime<Utc>,
}

impl Signature {
    pub fn key(&self) -> SignatureKey {
        (
            self.repository.clone(),
            self.framework.clone(),
            self.application.clone(),
            self.signature_hash.clone(),
        )
    }
}

/// Joins a set of tokens as a space-separated, lexicographically sorted
/// string — used for `extra_options` and `tags` (§3) and for
/// `alert_notify_emails`.
pub fn order_and_concat(words: &[String]) -> String {
    let mut sorted = words.to_vec();
    sorted.sort();
    sorted.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prop_map(pairs: &[(&str, PropertyValue)]) -> PropertyMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let p = prop_map(&[
            ("suite", "speedometer3".into()),
            ("platform", "linux64".into()),
        ]);
        assert_eq!(fingerprint(&p), fingerprint(&p));
    }

    #[test]
    fn fingerprint_ignores_map_insertion_order() {
        let mut a = PropertyMap::new();
        a.insert("suite".to_string(), "speedometer3".into());
        a.insert("platform".to_string(), "linux64".into());

        let mut b = PropertyMap::new();
        b.insert("platform".to_string(), "linux64".into());
        b.insert("suite".to_string(), "speedometer3".into());

        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn fingerprint_matches_known_golden_hash() {
        // sorted bag = ["linux64", "platform", "speedometer3", "suite"]
        // concatenated -> "linux64platformspeedometer3suite"
        let p = prop_map(&[
            ("suite", "speedometer3".into()),
            ("platform", "linux64".into()),
        ]);
        let mut hasher = Sha1::new();
        hasher.update(b"linux64platformspeedometer3suite");
        let expected = hex::encode(hasher.finalize());
        assert_eq!(fingerprint(&p), expected);
    }

    #[test]
    fn fingerprint_sorts_nested_json_keys_before_hashing() {
        let v1 = serde_json::json!({"b": 1, "a": 2});
        let v2 = serde_json::json!({"a": 2, "b": 1});
        let p1 = prop_map(&[("extra", v1.into())]);
        let p2 = prop_map(&[("extra", v2.into())]);
        assert_eq!(fingerprint(&p1), fingerprint(&p2));
    }

    #[test]
    fn order_and_concat_sorts_and_joins() {
        let words = vec!["b".to_string(), "a".to_string(), "c".to_string()];
        assert_eq!(order_and_concat(&words), "a b c");
    }

    #[test]
    fn order_and_concat_of_empty_is_empty_string() {
        assert_eq!(order_and_concat(&[]), "");
    }
}
