//! Lossless conversion between the internal manifest model and an external
//! C2PA-shaped dictionary.
//!
//! Historical producers diverged on field names (`ai_info` vs
//! `ai_assertion`, a bare top-level `actions` list vs a `c2pa.actions.v1`
//! assertion). The bridge converges everything onto the internal names; the
//! signing path only ever sees the canonical model. An assertion flagged
//! `data_encoding: "cbor_base64"` carries its `data` as base64 of CBOR and
//! round-trips through that encoding transparently.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::canonical::canonical_cbor_bytes;
use crate::config::CONTEXT_URL_V2_2;
use crate::error::{GlyphsealError, Result};

use super::manifest::{actions_assertion, Action, C2paAssertion, C2paManifest, ACTIONS_LABEL};

/// Marker value of `data_encoding` for CBOR-in-base64 assertion data.
pub const DATA_ENCODING_CBOR_BASE64: &str = "cbor_base64";

fn as_object<'a>(value: &'a Value, what: &str) -> Result<&'a Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| GlyphsealError::InvalidPayload(format!("{what} is not an object")))
}

fn string_field(map: &Map<String, Value>, key: &str) -> Result<Option<String>> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(GlyphsealError::InvalidPayload(format!(
            "'{key}' is not a string"
        ))),
    }
}

fn object_field(map: &Map<String, Value>, key: &str) -> Result<Option<Map<String, Value>>> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(o)) => Ok(Some(o.clone())),
        Some(_) => Err(GlyphsealError::InvalidPayload(format!(
            "'{key}' is not an object"
        ))),
    }
}

fn decode_cbor_base64(data: &Value) -> Result<Value> {
    let b64 = data.as_str().ok_or_else(|| {
        GlyphsealError::InvalidPayload("cbor_base64 data is not a string".into())
    })?;
    let bytes = STANDARD
        .decode(b64)
        .map_err(|e| GlyphsealError::InvalidPayload(format!("cbor_base64 data: {e}")))?;
    let value: ciborium::value::Value = ciborium::from_reader(bytes.as_slice())
        .map_err(|e| GlyphsealError::InvalidPayload(format!("cbor_base64 data: {e}")))?;
    value
        .deserialized()
        .map_err(|e| GlyphsealError::InvalidPayload(format!("cbor_base64 data: {e}")))
}

fn encode_cbor_base64(data: &Value) -> Result<Value> {
    let cbor = ciborium::value::Value::serialized(data)
        .map_err(|e| GlyphsealError::InvalidPayload(format!("cbor_base64 data: {e}")))?;
    let bytes = canonical_cbor_bytes(&cbor)?;
    Ok(Value::String(STANDARD.encode(bytes)))
}

fn assertion_from_external(entry: &Value) -> Result<C2paAssertion> {
    let map = as_object(entry, "assertion")?;
    let label = string_field(map, "label")?
        .ok_or_else(|| GlyphsealError::InvalidPayload("assertion missing 'label'".into()))?;
    let kind = string_field(map, "kind")?;
    let data_encoding = string_field(map, "data_encoding")?;
    let raw_data = map.get("data").cloned().unwrap_or(Value::Null);

    let data = match data_encoding.as_deref() {
        Some(DATA_ENCODING_CBOR_BASE64) => decode_cbor_base64(&raw_data)?,
        Some(other) => {
            return Err(GlyphsealError::InvalidPayload(format!(
                "unknown data_encoding '{other}'"
            )))
        }
        None => raw_data,
    };

    Ok(C2paAssertion {
        label,
        data,
        kind,
        data_encoding,
    })
}

/// Convert an external C2PA-like dictionary into the internal model.
///
/// Field renames only; nothing the input carries is dropped. A missing
/// `instance_id` receives a fresh v4 UUID so the result is always a
/// complete manifest.
pub fn external_to_internal(external: &Value) -> Result<C2paManifest> {
    let map = as_object(external, "manifest")?;

    let context = string_field(map, "@context")?
        .or(string_field(map, "context")?)
        .unwrap_or_else(|| CONTEXT_URL_V2_2.to_string());
    let instance_id = string_field(map, "instance_id")?
        .or(string_field(map, "instanceId")?)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let claim_generator = string_field(map, "claim_generator")?
        .or(string_field(map, "claimGenerator")?)
        .unwrap_or_default();

    let mut assertions = Vec::new();
    if let Some(list) = map.get("assertions") {
        let list = list.as_array().ok_or_else(|| {
            GlyphsealError::InvalidPayload("'assertions' is not an array".into())
        })?;
        for entry in list {
            assertions.push(assertion_from_external(entry)?);
        }
    }

    // Historical shape: a bare top-level actions list instead of the
    // c2pa.actions.v1 assertion.
    if let Some(actions) = map.get("actions") {
        if !assertions.iter().any(|a| a.label == ACTIONS_LABEL) {
            let actions: Vec<Action> = serde_json::from_value(actions.clone())
                .map_err(|e| GlyphsealError::InvalidPayload(format!("actions list: {e}")))?;
            assertions.insert(0, actions_assertion(&actions)?);
        }
    }

    let ai_assertion = match object_field(map, "ai_assertion")? {
        Some(found) => Some(found),
        None => object_field(map, "ai_info")?,
    };
    let custom_claims = object_field(map, "custom_claims")?;

    Ok(C2paManifest {
        context,
        instance_id,
        claim_generator,
        assertions,
        ai_assertion,
        custom_claims,
    })
}

/// Convert the internal model to the external dictionary shape. Inverse of
/// [`external_to_internal`] on either function's image.
pub fn internal_to_external(manifest: &C2paManifest) -> Result<Value> {
    let mut assertions = Vec::with_capacity(manifest.assertions.len());
    for assertion in &manifest.assertions {
        let mut entry = Map::new();
        entry.insert("label".into(), Value::String(assertion.label.clone()));
        let data = match assertion.data_encoding.as_deref() {
            Some(DATA_ENCODING_CBOR_BASE64) => encode_cbor_base64(&assertion.data)?,
            _ => assertion.data.clone(),
        };
        entry.insert("data".into(), data);
        if let Some(kind) = &assertion.kind {
            entry.insert("kind".into(), Value::String(kind.clone()));
        }
        if let Some(encoding) = &assertion.data_encoding {
            entry.insert("data_encoding".into(), Value::String(encoding.clone()));
        }
        assertions.push(Value::Object(entry));
    }

    let mut out = Map::new();
    out.insert("@context".into(), Value::String(manifest.context.clone()));
    out.insert(
        "instance_id".into(),
        Value::String(manifest.instance_id.clone()),
    );
    out.insert(
        "claim_generator".into(),
        Value::String(manifest.claim_generator.clone()),
    );
    out.insert("assertions".into(), Value::Array(assertions));
    if let Some(ai) = &manifest.ai_assertion {
        out.insert("ai_assertion".into(), Value::Object(ai.clone()));
    }
    if let Some(claims) = &manifest.custom_claims {
        out.insert("custom_claims".into(), Value::Object(claims.clone()));
    }
    Ok(Value::Object(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn external_sample() -> Value {
        json!({
            "@context": CONTEXT_URL_V2_2,
            "instance_id": "11111111-2222-4333-8444-555555555555",
            "claim_generator": "legacy-tool/3.2",
            "assertions": [
                {
                    "label": "c2pa.actions.v1",
                    "data": {"actions": [{"label": "c2pa.created", "when": "2025-01-01T00:00:00Z"}]},
                    "kind": "Actions"
                }
            ],
            "custom_claims": {"department": "newsroom"}
        })
    }

    #[test]
    fn external_internal_round_trip_is_identity() {
        let external = external_sample();
        let internal = external_to_internal(&external).unwrap();
        let back = internal_to_external(&internal).unwrap();
        assert_eq!(back, external);

        let internal_again = external_to_internal(&back).unwrap();
        assert_eq!(internal_again, internal);
    }

    #[test]
    fn ai_info_converges_to_ai_assertion() {
        let external = json!({
            "instance_id": "11111111-2222-4333-8444-555555555555",
            "claim_generator": "old/1.0",
            "ai_info": {"model_id": "gpt-x"}
        });
        let internal = external_to_internal(&external).unwrap();
        assert_eq!(
            internal.ai_assertion.as_ref().unwrap()["model_id"],
            "gpt-x"
        );
        let back = internal_to_external(&internal).unwrap();
        assert!(back.get("ai_assertion").is_some());
        assert!(back.get("ai_info").is_none());
    }

    #[test]
    fn top_level_actions_fold_into_assertion() {
        let external = json!({
            "instance_id": "11111111-2222-4333-8444-555555555555",
            "actions": [{"label": "c2pa.created"}]
        });
        let internal = external_to_internal(&external).unwrap();
        let actions = internal.actions().unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].label, "c2pa.created");
    }

    #[test]
    fn cbor_base64_data_round_trips_transparently() {
        let inner = json!({"alg": "sha256", "hash": "00ff"});
        let cbor = ciborium::value::Value::serialized(&inner).unwrap();
        let bytes = canonical_cbor_bytes(&cbor).unwrap();
        let external = json!({
            "instance_id": "11111111-2222-4333-8444-555555555555",
            "assertions": [{
                "label": "vendor.custom",
                "data": STANDARD.encode(&bytes),
                "data_encoding": "cbor_base64"
            }]
        });

        let internal = external_to_internal(&external).unwrap();
        assert_eq!(internal.assertions[0].data, inner);

        let back = internal_to_external(&internal).unwrap();
        assert_eq!(back["assertions"][0]["data"], json!(STANDARD.encode(&bytes)));
        let internal_again = external_to_internal(&back).unwrap();
        assert_eq!(internal_again, internal);
    }

    #[test]
    fn missing_instance_id_gets_generated() {
        let internal = external_to_internal(&json!({"claim_generator": "x"})).unwrap();
        assert!(!internal.instance_id.is_empty());
    }

    #[test]
    fn unknown_data_encoding_is_rejected() {
        let external = json!({
            "assertions": [{"label": "a", "data": "xx", "data_encoding": "hex"}]
        });
        assert!(matches!(
            external_to_internal(&external),
            Err(GlyphsealError::InvalidPayload(_))
        ));
    }

    #[test]
    fn non_object_input_is_rejected() {
        assert!(external_to_internal(&json!(["not", "a", "map"])).is_err());
    }
}
