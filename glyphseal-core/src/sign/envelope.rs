//! The legacy signed envelope.
//!
//! On-text form is canonical JSON of
//! `{"format": tag, "payload": ..., "signature": b64url, "signer_id": id}`
//! where `payload` is the JSON object itself for the JSON-backed formats
//! and base64 of the canonical CBOR bytes for `manifest-cbor`. The
//! signature is Ed25519 over `format_tag || 0x00 || payload_bytes`, domain
//! separated so a payload signed under one format cannot be replayed under
//! another.

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde_json::Value;

use crate::canonical::canonical_json_bytes;
use crate::error::{GlyphsealError, Result};
use crate::payload::MetadataFormat;

/// Envelope payload, by transport encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum EnvelopePayload {
    /// A JSON object embedded directly (formats `basic`, `manifest-json`).
    Json(Value),
    /// Canonical CBOR bytes, carried base64-encoded (`manifest-cbor`).
    Cbor(Vec<u8>),
}

impl EnvelopePayload {
    /// The exact bytes the signature covers.
    pub fn signing_bytes(&self) -> Result<Vec<u8>> {
        match self {
            Self::Json(value) => canonical_json_bytes(value),
            Self::Cbor(bytes) => Ok(bytes.clone()),
        }
    }
}

/// A parsed legacy envelope.
#[derive(Debug, Clone)]
pub struct SignedEnvelope {
    pub format: MetadataFormat,
    pub payload: EnvelopePayload,
    pub signature: Vec<u8>,
    pub signer_id: String,
}

fn signing_input(format: MetadataFormat, payload_bytes: &[u8]) -> Vec<u8> {
    let tag = format.tag().as_bytes();
    let mut input = Vec::with_capacity(tag.len() + 1 + payload_bytes.len());
    input.extend_from_slice(tag);
    input.push(0x00);
    input.extend_from_slice(payload_bytes);
    input
}

/// Sign a legacy payload.
pub fn sign_envelope(
    format: MetadataFormat,
    payload: &EnvelopePayload,
    key: &SigningKey,
    signer_id: &str,
) -> Result<SignedEnvelope> {
    let payload_bytes = payload.signing_bytes()?;
    let signature: Signature = key.sign(&signing_input(format, &payload_bytes));
    Ok(SignedEnvelope {
        format,
        payload: payload.clone(),
        signature: signature.to_bytes().to_vec(),
        signer_id: signer_id.to_string(),
    })
}

/// Serialize an envelope to its canonical on-text JSON bytes.
pub fn encode_envelope(envelope: &SignedEnvelope) -> Result<Vec<u8>> {
    let payload_value = match &envelope.payload {
        EnvelopePayload::Json(value) => value.clone(),
        EnvelopePayload::Cbor(bytes) => Value::String(STANDARD.encode(bytes)),
    };
    let outer = serde_json::json!({
        "format": envelope.format.tag(),
        "payload": payload_value,
        "signature": URL_SAFE_NO_PAD.encode(&envelope.signature),
        "signer_id": envelope.signer_id,
    });
    canonical_json_bytes(&outer)
}

fn field<'a>(outer: &'a Value, key: &str) -> Result<&'a Value> {
    outer
        .get(key)
        .ok_or_else(|| GlyphsealError::MalformedEnvelope(format!("envelope missing '{key}'")))
}

/// Parse the on-text JSON bytes back into an envelope.
pub fn decode_envelope(bytes: &[u8]) -> Result<SignedEnvelope> {
    let outer: Value = serde_json::from_slice(bytes)
        .map_err(|e| GlyphsealError::MalformedEnvelope(format!("envelope JSON: {e}")))?;
    if !outer.is_object() {
        return Err(GlyphsealError::MalformedEnvelope(
            "envelope is not an object".into(),
        ));
    }

    let format_tag = field(&outer, "format")?
        .as_str()
        .ok_or_else(|| GlyphsealError::MalformedEnvelope("'format' is not a string".into()))?;
    let format = MetadataFormat::from_tag(format_tag).ok_or_else(|| {
        GlyphsealError::UnsupportedFormat(format!("unknown envelope format '{format_tag}'"))
    })?;
    if format == MetadataFormat::C2pa {
        return Err(GlyphsealError::UnsupportedFormat(
            "c2pa payloads ride the manifest wrapper, not the legacy envelope".into(),
        ));
    }

    let signer_id = field(&outer, "signer_id")?
        .as_str()
        .ok_or_else(|| GlyphsealError::MalformedEnvelope("'signer_id' is not a string".into()))?
        .to_string();

    let signature_b64 = field(&outer, "signature")?
        .as_str()
        .ok_or_else(|| GlyphsealError::MalformedEnvelope("'signature' is not a string".into()))?;
    let signature = URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|e| GlyphsealError::MalformedEnvelope(format!("signature base64: {e}")))?;

    let payload_field = field(&outer, "payload")?;
    let payload = match format {
        MetadataFormat::ManifestCbor => {
            let b64 = payload_field.as_str().ok_or_else(|| {
                GlyphsealError::MalformedEnvelope("CBOR payload is not a string".into())
            })?;
            let bytes = STANDARD
                .decode(b64)
                .map_err(|e| GlyphsealError::MalformedEnvelope(format!("payload base64: {e}")))?;
            EnvelopePayload::Cbor(bytes)
        }
        _ => {
            if !payload_field.is_object() {
                return Err(GlyphsealError::MalformedEnvelope(
                    "JSON payload is not an object".into(),
                ));
            }
            EnvelopePayload::Json(payload_field.clone())
        }
    };

    Ok(SignedEnvelope {
        format,
        payload,
        signature,
        signer_id,
    })
}

/// Check the envelope signature against a resolved key.
pub fn verify_envelope(envelope: &SignedEnvelope, key: &VerifyingKey) -> Result<()> {
    let payload_bytes = envelope.payload.signing_bytes()?;
    let signature =
        Signature::from_slice(&envelope.signature).map_err(|_| GlyphsealError::BadSignature)?;
    key.verify(&signing_input(envelope.format, &payload_bytes), &signature)
        .map_err(|_| GlyphsealError::BadSignature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sign::generate_keypair;
    use serde_json::json;

    #[test]
    fn json_envelope_round_trip() {
        let (signing, verifying) = generate_keypair();
        let payload = EnvelopePayload::Json(json!({"model_id": "m", "version": "1"}));
        let envelope =
            sign_envelope(MetadataFormat::Basic, &payload, &signing, "signer-a").unwrap();

        let bytes = encode_envelope(&envelope).unwrap();
        let decoded = decode_envelope(&bytes).unwrap();
        assert_eq!(decoded.format, MetadataFormat::Basic);
        assert_eq!(decoded.signer_id, "signer-a");
        assert_eq!(decoded.payload, payload);
        verify_envelope(&decoded, &verifying).unwrap();
    }

    #[test]
    fn cbor_envelope_round_trip() {
        let (signing, verifying) = generate_keypair();
        let payload = EnvelopePayload::Cbor(vec![0xA1, 0x61, 0x61, 0x01]);
        let envelope =
            sign_envelope(MetadataFormat::ManifestCbor, &payload, &signing, "signer-b").unwrap();

        let bytes = encode_envelope(&envelope).unwrap();
        let decoded = decode_envelope(&bytes).unwrap();
        assert_eq!(decoded.payload, payload);
        verify_envelope(&decoded, &verifying).unwrap();
    }

    #[test]
    fn format_tag_is_domain_separating() {
        let (signing, verifying) = generate_keypair();
        let payload = EnvelopePayload::Json(json!({"k": "v"}));
        let envelope =
            sign_envelope(MetadataFormat::Basic, &payload, &signing, "signer").unwrap();

        let replayed = SignedEnvelope {
            format: MetadataFormat::ManifestJson,
            ..envelope
        };
        assert!(matches!(
            verify_envelope(&replayed, &verifying),
            Err(GlyphsealError::BadSignature)
        ));
    }

    #[test]
    fn tampered_payload_fails() {
        let (signing, verifying) = generate_keypair();
        let payload = EnvelopePayload::Json(json!({"k": "v"}));
        let mut envelope =
            sign_envelope(MetadataFormat::Basic, &payload, &signing, "signer").unwrap();
        envelope.payload = EnvelopePayload::Json(json!({"k": "w"}));
        assert!(matches!(
            verify_envelope(&envelope, &verifying),
            Err(GlyphsealError::BadSignature)
        ));
    }

    #[test]
    fn missing_fields_are_malformed() {
        let err = decode_envelope(br#"{"format":"basic","payload":{}}"#).unwrap_err();
        assert!(matches!(err, GlyphsealError::MalformedEnvelope(_)));
    }

    #[test]
    fn unknown_format_is_unsupported() {
        let err =
            decode_envelope(br#"{"format":"jumbf","payload":{},"signature":"","signer_id":"s"}"#)
                .unwrap_err();
        assert!(matches!(err, GlyphsealError::UnsupportedFormat(_)));
    }
}
