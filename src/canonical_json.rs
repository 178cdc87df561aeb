//! Byte-deterministic JSON writer (C9).
//!
//! Two representations in this crate must be byte-identical across hosts:
//! the pack document and the manifest string hashed into `pack_id`. The
//! manifest is a plain concatenation (see [`crate::pack::manifest_string`]);
//! the JSON document needs a canonicalizer because `serde_json`'s default
//! `Map` iteration order depends on insertion order, not key order. Any two
//! logically equal `serde_json::Value`s written through [`to_canonical_bytes`]
//! produce identical bytes: UTF-8, keys sorted ascending by code point, no
//! insignificant whitespace, no non-ASCII escaping, one trailing newline.

use serde::Serialize;
use serde_json::Value;

/// Serialize `value` to canonical JSON bytes (see module docs for the exact
/// byte-determinism contract), ending in a single trailing newline.
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> serde_json::Result<Vec<u8>> {
    let mut json = serde_json::to_value(value)?;
    sort_keys(&mut json);
    let mut bytes = write_compact(&json);
    bytes.push(b'\n');
    Ok(bytes)
}

/// Recursively sort every object's keys ascending by code point.
///
/// `serde_json::Map` preserves insertion order by default (and is a
/// `BTreeMap` only when the `preserve_order` feature is disabled, which we
/// do not rely on); rebuilding each map from a sorted `Vec` guarantees
/// deterministic iteration regardless of feature flags.
pub fn sort_keys(value: &mut Value) {
    match value {
        Value::Array(items) => {
            for item in items.iter_mut() {
                sort_keys(item);
            }
        }
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = std::mem::take(map).into_iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));
            let mut sorted = serde_json::Map::with_capacity(entries.len());
            for (key, mut value) in entries {
                sort_keys(&mut value);
                sorted.insert(key, value);
            }
            *map = sorted;
        }
        _ => {}
    }
}

/// Write a pre-sorted `Value` as compact JSON with no non-ASCII escaping.
///
/// `serde_json::to_vec` already omits insignificant whitespace and does not
/// escape multi-byte UTF-8 by default, so once keys are sorted this is a
/// direct pass-through; the function exists to keep the "what does
/// canonical mean here" contract in one place rather than spread across
/// call sites.
fn write_compact(value: &Value) -> Vec<u8> {
    serde_json::to_vec(value).expect("canonicalized Value always serializes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sorts_object_keys() {
        let value = json!({"b": 1, "a": 2, "c": {"z": 1, "y": 2}});
        let bytes = to_canonical_bytes(&value).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text, "{\"a\":2,\"b\":1,\"c\":{\"y\":2,\"z\":1}}\n");
    }

    #[test]
    fn is_order_independent() {
        let a = json!({"x": 1, "y": 2});
        let b = json!({"y": 2, "x": 1});
        assert_eq!(
            to_canonical_bytes(&a).unwrap(),
            to_canonical_bytes(&b).unwrap()
        );
    }

    #[test]
    fn emits_unicode_unescaped() {
        let value = json!({"title": "caf\u{e9}"});
        let bytes = to_canonical_bytes(&value).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains('\u{e9}'));
        assert!(!text.contains("\\u00e9"));
    }

    #[test]
    fn ends_with_single_newline() {
        let bytes = to_canonical_bytes(&json!({"a": 1})).unwrap();
        assert_eq!(bytes.last(), Some(&b'\n'));
        assert!(!bytes[..bytes.len() - 1].ends_with(b"\n"));
    }
}
