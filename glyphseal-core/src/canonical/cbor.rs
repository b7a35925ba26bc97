//! Canonical CBOR encoding.
//!
//! ciborium already emits shortest-form integer heads; what it does not do
//! is order map keys. The canonical form sorts every map by the byte-wise
//! order of each key's own encoding (RFC 8949 core deterministic profile)
//! and rejects floats and duplicate keys.

use ciborium::value::Value;
use serde::Serialize;

use crate::error::{GlyphsealError, Result};

use super::MAX_DEPTH;

/// Serialize any serde value to canonical CBOR bytes.
pub fn to_canonical_cbor<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let value = Value::serialized(value)
        .map_err(|e| GlyphsealError::InvalidPayload(format!("CBOR model error: {e}")))?;
    canonical_cbor_bytes(&value)
}

/// Serialize a CBOR value tree to canonical bytes.
pub fn canonical_cbor_bytes(value: &Value) -> Result<Vec<u8>> {
    let canonical = canonicalize(value, 0)?;
    encode(&canonical)
}

fn encode(value: &Value) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    ciborium::into_writer(value, &mut out)
        .map_err(|e| GlyphsealError::InvalidPayload(format!("CBOR encoding error: {e}")))?;
    Ok(out)
}

fn canonicalize(value: &Value, depth: usize) -> Result<Value> {
    if depth > MAX_DEPTH {
        return Err(GlyphsealError::InvalidPayload(format!(
            "payload nested deeper than {MAX_DEPTH} levels"
        )));
    }
    match value {
        Value::Float(_) => Err(GlyphsealError::InvalidPayload(
            "floats are not allowed in signed payloads".into(),
        )),
        Value::Array(items) => Ok(Value::Array(
            items
                .iter()
                .map(|item| canonicalize(item, depth + 1))
                .collect::<Result<_>>()?,
        )),
        Value::Map(entries) => {
            let mut keyed: Vec<(Vec<u8>, Value, Value)> = Vec::with_capacity(entries.len());
            for (key, val) in entries {
                let key = canonicalize(key, depth + 1)?;
                let val = canonicalize(val, depth + 1)?;
                keyed.push((encode(&key)?, key, val));
            }
            keyed.sort_by(|a, b| a.0.cmp(&b.0));
            for pair in keyed.windows(2) {
                if pair[0].0 == pair[1].0 {
                    return Err(GlyphsealError::InvalidPayload(
                        "duplicate map key in signed payload".into(),
                    ));
                }
            }
            Ok(Value::Map(
                keyed.into_iter().map(|(_, k, v)| (k, v)).collect(),
            ))
        }
        Value::Tag(tag, inner) => Ok(Value::Tag(*tag, Box::new(canonicalize(inner, depth + 1)?))),
        other => Ok(other.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[test]
    fn map_keys_sorted_by_encoded_form() {
        // Text key encodings embed their length in the head byte, so the
        // one-byte key "b" sorts before the two-byte key "aa".
        let value = Value::Map(vec![
            (Value::Text("aa".into()), Value::Integer(1.into())),
            (Value::Text("b".into()), Value::Integer(2.into())),
        ]);
        let bytes = canonical_cbor_bytes(&value).unwrap();
        // a2 61 62 02 62 61 61 01
        assert_eq!(bytes, vec![0xA2, 0x61, 0x62, 0x02, 0x62, 0x61, 0x61, 0x01]);
    }

    #[test]
    fn integer_keys_sort_numerically() {
        let value = Value::Map(vec![
            (Value::Integer(4.into()), Value::Bytes(vec![1])),
            (Value::Integer(1.into()), Value::Integer((-8).into())),
        ]);
        let bytes = canonical_cbor_bytes(&value).unwrap();
        assert_eq!(bytes, vec![0xA2, 0x01, 0x27, 0x04, 0x41, 0x01]);
    }

    #[test]
    fn field_order_of_structs_is_erased() {
        #[derive(Serialize)]
        struct A {
            zeta: u32,
            alpha: u32,
        }
        #[derive(Serialize)]
        struct B {
            alpha: u32,
            zeta: u32,
        }
        let a = to_canonical_cbor(&A { zeta: 1, alpha: 2 }).unwrap();
        let b = to_canonical_cbor(&B { alpha: 2, zeta: 1 }).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_floats() {
        let err = canonical_cbor_bytes(&Value::Float(1.5)).unwrap_err();
        assert!(matches!(err, GlyphsealError::InvalidPayload(_)));
    }

    #[test]
    fn rejects_duplicate_keys() {
        let value = Value::Map(vec![
            (Value::Text("k".into()), Value::Integer(1.into())),
            (Value::Text("k".into()), Value::Integer(2.into())),
        ]);
        assert!(canonical_cbor_bytes(&value).is_err());
    }

    #[test]
    fn deterministic_for_equal_json_values() {
        let a: serde_json::Value = serde_json::json!({"y": [1, 2, {"b": 1, "a": 2}], "x": "s"});
        let b: serde_json::Value =
            serde_json::from_str(r#"{"x":"s","y":[1,2,{"a":2,"b":1}]}"#).unwrap();
        assert_eq!(to_canonical_cbor(&a).unwrap(), to_canonical_cbor(&b).unwrap());
    }
}
