//! JSON value helpers shared by the parser, stages and the graph store.
//!
//! Pipelines move plain JSON between stages. This module fixes the aliases
//! used everywhere ([`Json`] for mappings, [`JsonElement`] for any value) and
//! provides the small set of value operations the built-in stages need:
//! canonical fingerprints for deduplication, integer coercion for counting,
//! dotted-path lookup for queries and patch application for desired state.

use sha2::{Digest, Sha256};

/// A JSON mapping (object), the shape of node documents and patches.
pub type Json = serde_json::Map<String, serde_json::Value>;

/// Any JSON value flowing between stages.
pub type JsonElement = serde_json::Value;

/// Store-assigned node identifier property.
pub const NODE_ID: &str = "_id";

/// Store-assigned revision property, bumped on every update.
pub const NODE_REVISION: &str = "_rev";

/// Node document section names.
pub mod section {
    /// The section written by resource collectors.
    pub const REPORTED: &str = "reported";
    /// The section holding desired-state assignments.
    pub const DESIRED: &str = "desired";
    /// The section holding infrastructure metadata.
    pub const METADATA: &str = "metadata";
}

/// Returns true for store-internal property names (`_id`, `_rev`, ...).
#[must_use]
pub fn is_system_prop(key: &str) -> bool {
    key.starts_with('_')
}

/// Computes a stable identity for a JSON value.
///
/// Mappings are serialized with recursively sorted keys, so two mappings that
/// differ only in key order produce the same fingerprint. Scalars hash their
/// canonical JSON text, so `1` and `"1"` stay distinct.
#[must_use]
pub fn fingerprint(value: &JsonElement) -> String {
    let mut canonical = String::new();
    write_canonical(value, &mut canonical);
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..16])
}

fn write_canonical(value: &JsonElement, out: &mut String) {
    match value {
        JsonElement::Object(map) => {
            out.push('{');
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_unstable();
            for (index, key) in keys.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                out.push_str(&JsonElement::String((*key).clone()).to_string());
                out.push(':');
                if let Some(nested) = map.get(*key) {
                    write_canonical(nested, out);
                }
            }
            out.push('}');
        }
        JsonElement::Array(items) => {
            out.push('[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Interprets a JSON value as an integer the way `count` sums properties.
///
/// Integers pass through, floats truncate toward zero, booleans become 0/1
/// and strings are parsed if they hold an integer. Everything else is `None`.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn coerce_i64(value: &JsonElement) -> Option<i64> {
    match value {
        JsonElement::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|float| float.trunc() as i64)),
        JsonElement::Bool(flag) => Some(i64::from(*flag)),
        JsonElement::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// Resolves a dotted property path (`volume.age`) inside a mapping.
#[must_use]
pub fn value_at<'a>(root: &'a Json, path: &str) -> Option<&'a JsonElement> {
    let mut parts = path.split('.');
    let mut value = root.get(parts.next()?)?;
    for part in parts {
        value = value.as_object()?.get(part)?;
    }
    Some(value)
}

/// Applies a patch to a section mapping.
///
/// Non-null patch values overwrite or add keys, a null value deletes the key,
/// keys absent from the patch are left untouched. Applying the same patch
/// twice yields the same section.
pub fn apply_patch(section: &mut Json, patch: &Json) {
    for (key, value) in patch {
        if value.is_null() {
            section.remove(key);
        } else {
            section.insert(key.clone(), value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_fingerprint_ignores_key_order() {
        let a = json!({"name": "vol-1", "age": 32, "tags": {"x": 1, "y": 2}});
        let b = json!({"tags": {"y": 2, "x": 1}, "age": 32, "name": "vol-1"});
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn test_fingerprint_distinguishes_values() {
        assert_ne!(fingerprint(&json!({"a": 1})), fingerprint(&json!({"a": 2})));
        assert_ne!(fingerprint(&json!(1)), fingerprint(&json!("1")));
        assert_ne!(fingerprint(&json!(null)), fingerprint(&json!("null")));
    }

    #[test]
    fn test_fingerprint_nested_arrays_keep_order() {
        assert_ne!(fingerprint(&json!([1, 2])), fingerprint(&json!([2, 1])));
    }

    #[test]
    fn test_coerce_i64() {
        assert_eq!(coerce_i64(&json!(23)), Some(23));
        assert_eq!(coerce_i64(&json!(-4.9)), Some(-4));
        assert_eq!(coerce_i64(&json!(4.9)), Some(4));
        assert_eq!(coerce_i64(&json!(true)), Some(1));
        assert_eq!(coerce_i64(&json!(false)), Some(0));
        assert_eq!(coerce_i64(&json!("42")), Some(42));
        assert_eq!(coerce_i64(&json!(" 42 ")), Some(42));
        assert_eq!(coerce_i64(&json!("4.2")), None);
        assert_eq!(coerce_i64(&json!("volume")), None);
        assert_eq!(coerce_i64(&json!(null)), None);
        assert_eq!(coerce_i64(&json!([1])), None);
    }

    #[test]
    fn test_value_at_resolves_dotted_paths() {
        let doc = json!({"volume": {"age": 32, "tags": {"env": "prod"}}});
        let root = doc.as_object().unwrap();
        assert_eq!(value_at(root, "volume.age"), Some(&json!(32)));
        assert_eq!(value_at(root, "volume.tags.env"), Some(&json!("prod")));
        assert_eq!(value_at(root, "volume.missing"), None);
        assert_eq!(value_at(root, "volume.age.deeper"), None);
    }

    #[test]
    fn test_apply_patch_merges_and_deletes() {
        let mut section = json!({"clean": true, "owner": "team-a"})
            .as_object()
            .unwrap()
            .clone();
        let patch = json!({"clean": false, "delete": true, "owner": null})
            .as_object()
            .unwrap()
            .clone();

        apply_patch(&mut section, &patch);
        assert_eq!(
            JsonElement::Object(section.clone()),
            json!({"clean": false, "delete": true})
        );

        // a second application is a no-op
        apply_patch(&mut section, &patch);
        assert_eq!(
            JsonElement::Object(section),
            json!({"clean": false, "delete": true})
        );
    }

    #[test]
    fn test_is_system_prop() {
        assert!(is_system_prop(NODE_ID));
        assert!(is_system_prop(NODE_REVISION));
        assert!(!is_system_prop("reported"));
    }
}
