//! Canonical JSON writer.
//!
//! Profile: UTF-8, object keys sorted ascending by code point, no
//! whitespace between tokens, integer-only numbers, minimal string
//! escaping. Floats are rejected because their textual form is not stable
//! across platforms.

use serde_json::Value;

use crate::error::{GlyphsealError, Result};

use super::MAX_DEPTH;

/// Serialize `value` to canonical JSON bytes.
pub fn canonical_json_bytes(value: &Value) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    write_value(value, &mut out, 0)?;
    Ok(out)
}

fn write_value(value: &Value, out: &mut Vec<u8>, depth: usize) -> Result<()> {
    if depth > MAX_DEPTH {
        return Err(GlyphsealError::InvalidPayload(format!(
            "payload nested deeper than {MAX_DEPTH} levels"
        )));
    }
    match value {
        Value::Null => out.extend_from_slice(b"null"),
        Value::Bool(true) => out.extend_from_slice(b"true"),
        Value::Bool(false) => out.extend_from_slice(b"false"),
        Value::Number(n) => {
            if n.is_f64() {
                return Err(GlyphsealError::InvalidPayload(
                    "floats are not allowed in signed payloads".into(),
                ));
            }
            out.extend_from_slice(n.to_string().as_bytes());
        }
        Value::String(s) => write_string(s, out),
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_value(item, out, depth + 1)?;
            }
            out.push(b']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_unstable();
            out.push(b'{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_string(key, out);
                out.push(b':');
                write_value(&map[key.as_str()], out, depth + 1)?;
            }
            out.push(b'}');
        }
    }
    Ok(())
}

fn write_string(s: &str, out: &mut Vec<u8>) {
    out.push(b'"');
    for c in s.chars() {
        match c {
            '"' => out.extend_from_slice(b"\\\""),
            '\\' => out.extend_from_slice(b"\\\\"),
            '\u{0008}' => out.extend_from_slice(b"\\b"),
            '\u{000C}' => out.extend_from_slice(b"\\f"),
            '\n' => out.extend_from_slice(b"\\n"),
            '\r' => out.extend_from_slice(b"\\r"),
            '\t' => out.extend_from_slice(b"\\t"),
            c if (c as u32) < 0x20 => {
                out.extend_from_slice(format!("\\u{:04x}", c as u32).as_bytes());
            }
            c => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
    out.push(b'"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn canonical(value: Value) -> String {
        String::from_utf8(canonical_json_bytes(&value).unwrap()).unwrap()
    }

    #[test]
    fn sorts_keys_and_strips_whitespace() {
        let value = json!({"zeta": 1, "alpha": {"b": 2, "a": 3}});
        assert_eq!(canonical(value), r#"{"alpha":{"a":3,"b":2},"zeta":1}"#);
    }

    #[test]
    fn equal_values_serialize_identically() {
        let a: Value = serde_json::from_str(r#"{ "x": [1, 2],  "y": "z" }"#).unwrap();
        let b = json!({"y": "z", "x": [1, 2]});
        assert_eq!(
            canonical_json_bytes(&a).unwrap(),
            canonical_json_bytes(&b).unwrap()
        );
    }

    #[test]
    fn rejects_floats() {
        let err = canonical_json_bytes(&json!({"n": 1.5})).unwrap_err();
        assert!(matches!(err, GlyphsealError::InvalidPayload(_)));
    }

    #[test]
    fn integers_keep_exact_form() {
        assert_eq!(canonical(json!([-1, 0, 42, 9007199254740993i64])), "[-1,0,42,9007199254740993]");
    }

    #[test]
    fn escapes_only_what_must_be_escaped() {
        let value = json!({"s": "a\"b\\c\nd\u{0001}é"});
        assert_eq!(canonical(value), "{\"s\":\"a\\\"b\\\\c\\nd\\u0001é\"}");
    }

    #[test]
    fn rejects_excessive_nesting() {
        let mut value = json!(1);
        for _ in 0..200 {
            value = json!([value]);
        }
        assert!(canonical_json_bytes(&value).is_err());
    }
}
