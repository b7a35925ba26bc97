//! COSE_Sign1 assembly and verification (RFC 8152).
//!
//! Wire shape, bit-exact:
//! - protected header: canonical CBOR of `{1: -8, 4: signer_id_utf8}`
//! - unprotected header: empty map
//! - payload: canonical CBOR of the manifest
//! - signature: Ed25519 over `["Signature1", protected, h'', payload]`
//!
//! Messages are emitted with tag 18; the decoder accepts tagged and
//! untagged arrays.

use ciborium::value::Value;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};

use crate::canonical::canonical_cbor_bytes;
use crate::error::{GlyphsealError, Result};

/// CBOR tag for a COSE_Sign1 message.
const COSE_SIGN1_TAG: u64 = 18;
/// Protected-header label for the signature algorithm.
const HEADER_LABEL_ALG: i128 = 1;
/// Protected-header label for the key identifier.
const HEADER_LABEL_KID: i128 = 4;
/// COSE algorithm identifier for EdDSA.
const ALG_EDDSA: i128 = -8;

/// A decoded COSE_Sign1 message.
#[derive(Debug, Clone)]
pub struct CoseSign1 {
    /// Serialized protected header, exactly as signed.
    pub protected: Vec<u8>,
    /// The signer id carried in the protected header.
    pub signer_id: String,
    /// The embedded payload bytes.
    pub payload: Vec<u8>,
    /// The Ed25519 signature bytes.
    pub signature: Vec<u8>,
}

fn protected_header(signer_id: &str) -> Result<Vec<u8>> {
    let map = Value::Map(vec![
        (Value::Integer(1.into()), Value::Integer((-8).into())),
        (
            Value::Integer(4.into()),
            Value::Bytes(signer_id.as_bytes().to_vec()),
        ),
    ]);
    canonical_cbor_bytes(&map)
}

fn sig_structure(protected: &[u8], payload: &[u8]) -> Result<Vec<u8>> {
    let structure = Value::Array(vec![
        Value::Text("Signature1".into()),
        Value::Bytes(protected.to_vec()),
        Value::Bytes(Vec::new()),
        Value::Bytes(payload.to_vec()),
    ]);
    let mut out = Vec::new();
    ciborium::into_writer(&structure, &mut out)
        .map_err(|e| GlyphsealError::MalformedEnvelope(format!("Sig_structure: {e}")))?;
    Ok(out)
}

/// Sign `payload` into a serialized COSE_Sign1 message.
pub fn sign_cose(payload: &[u8], key: &SigningKey, signer_id: &str) -> Result<Vec<u8>> {
    let protected = protected_header(signer_id)?;
    let to_sign = sig_structure(&protected, payload)?;
    let signature: Signature = key.sign(&to_sign);

    let message = Value::Tag(
        COSE_SIGN1_TAG,
        Box::new(Value::Array(vec![
            Value::Bytes(protected),
            Value::Map(Vec::new()),
            Value::Bytes(payload.to_vec()),
            Value::Bytes(signature.to_bytes().to_vec()),
        ])),
    );
    let mut out = Vec::new();
    ciborium::into_writer(&message, &mut out)
        .map_err(|e| GlyphsealError::MalformedEnvelope(format!("COSE encoding: {e}")))?;
    Ok(out)
}

fn as_bytes(value: &Value, what: &str) -> Result<Vec<u8>> {
    match value {
        Value::Bytes(b) => Ok(b.clone()),
        _ => Err(GlyphsealError::MalformedEnvelope(format!(
            "COSE {what} is not a byte string"
        ))),
    }
}

/// Decode a serialized COSE_Sign1 message without verifying the signature.
pub fn decode_cose(bytes: &[u8]) -> Result<CoseSign1> {
    let value: Value = ciborium::from_reader(bytes)
        .map_err(|e| GlyphsealError::MalformedEnvelope(format!("COSE decoding: {e}")))?;
    let items = match value {
        Value::Tag(COSE_SIGN1_TAG, inner) => match *inner {
            Value::Array(items) => items,
            _ => {
                return Err(GlyphsealError::MalformedEnvelope(
                    "COSE tag does not wrap an array".into(),
                ))
            }
        },
        Value::Array(items) => items,
        _ => {
            return Err(GlyphsealError::MalformedEnvelope(
                "COSE message is not an array".into(),
            ))
        }
    };
    if items.len() != 4 {
        return Err(GlyphsealError::MalformedEnvelope(format!(
            "COSE_Sign1 expects 4 fields, found {}",
            items.len()
        )));
    }

    let protected = as_bytes(&items[0], "protected header")?;
    let payload = as_bytes(&items[2], "payload")?;
    let signature = as_bytes(&items[3], "signature")?;
    let signer_id = parse_protected(&protected)?;

    Ok(CoseSign1 {
        protected,
        signer_id,
        payload,
        signature,
    })
}

fn parse_protected(protected: &[u8]) -> Result<String> {
    let value: Value = ciborium::from_reader(protected)
        .map_err(|e| GlyphsealError::MalformedEnvelope(format!("protected header: {e}")))?;
    let entries = match value {
        Value::Map(entries) => entries,
        _ => {
            return Err(GlyphsealError::MalformedEnvelope(
                "protected header is not a map".into(),
            ))
        }
    };

    let mut alg = None;
    let mut kid = None;
    for (key, val) in entries {
        let label = match key {
            Value::Integer(i) => i128::from(i),
            _ => continue,
        };
        if label == HEADER_LABEL_ALG {
            if let Value::Integer(i) = val {
                alg = Some(i128::from(i));
            }
        } else if label == HEADER_LABEL_KID {
            if let Value::Bytes(b) = val {
                kid = Some(b);
            }
        }
    }

    match alg {
        Some(ALG_EDDSA) => {}
        Some(other) => {
            return Err(GlyphsealError::MalformedEnvelope(format!(
                "unsupported COSE algorithm {other}"
            )))
        }
        None => {
            return Err(GlyphsealError::MalformedEnvelope(
                "protected header missing algorithm".into(),
            ))
        }
    }
    let kid = kid.ok_or_else(|| {
        GlyphsealError::MalformedEnvelope("protected header missing key id".into())
    })?;
    String::from_utf8(kid)
        .map_err(|_| GlyphsealError::MalformedEnvelope("key id is not UTF-8".into()))
}

/// Verify the Ed25519 signature of a decoded message.
pub fn verify_cose(message: &CoseSign1, key: &VerifyingKey) -> Result<()> {
    let to_verify = sig_structure(&message.protected, &message.payload)?;
    let signature = Signature::from_slice(&message.signature)
        .map_err(|_| GlyphsealError::BadSignature)?;
    key.verify(&to_verify, &signature)
        .map_err(|_| GlyphsealError::BadSignature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sign::generate_keypair;

    #[test]
    fn sign_decode_verify_round_trip() {
        let (signing, verifying) = generate_keypair();
        let cose = sign_cose(b"payload bytes", &signing, "signer-1").unwrap();

        let decoded = decode_cose(&cose).unwrap();
        assert_eq!(decoded.signer_id, "signer-1");
        assert_eq!(decoded.payload, b"payload bytes");
        verify_cose(&decoded, &verifying).unwrap();
    }

    #[test]
    fn protected_header_bytes_are_pinned() {
        // {1: -8, 4: 's1'} -> a2 01 27 04 42 73 31
        let header = protected_header("s1").unwrap();
        assert_eq!(header, vec![0xA2, 0x01, 0x27, 0x04, 0x42, 0x73, 0x31]);
    }

    #[test]
    fn message_is_tagged_18() {
        let (signing, _) = generate_keypair();
        let cose = sign_cose(b"x", &signing, "s").unwrap();
        // d2 is tag(18).
        assert_eq!(cose[0], 0xD2);
    }

    #[test]
    fn untagged_message_still_decodes() {
        let (signing, verifying) = generate_keypair();
        let tagged = sign_cose(b"x", &signing, "s").unwrap();
        let untagged = tagged[1..].to_vec();
        let decoded = decode_cose(&untagged).unwrap();
        verify_cose(&decoded, &verifying).unwrap();
    }

    #[test]
    fn tampered_payload_fails_verification() {
        let (signing, verifying) = generate_keypair();
        let cose = sign_cose(b"payload", &signing, "s").unwrap();
        let mut decoded = decode_cose(&cose).unwrap();
        decoded.payload[0] ^= 0x01;
        assert!(matches!(
            verify_cose(&decoded, &verifying),
            Err(GlyphsealError::BadSignature)
        ));
    }

    #[test]
    fn wrong_key_fails_verification() {
        let (signing, _) = generate_keypair();
        let (_, other) = generate_keypair();
        let cose = sign_cose(b"payload", &signing, "s").unwrap();
        let decoded = decode_cose(&cose).unwrap();
        assert!(matches!(
            verify_cose(&decoded, &other),
            Err(GlyphsealError::BadSignature)
        ));
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(
            decode_cose(b"not cbor at all"),
            Err(GlyphsealError::MalformedEnvelope(_))
        ));
    }
}
