//! Signing and verification primitives.
//!
//! Two envelope shapes share one signature algorithm: COSE_Sign1 for the
//! C2PA pipeline and a domain-separated raw-bytes envelope for the legacy
//! formats. Key lookup on the verify side goes through the [`KeyResolver`]
//! capability so the core never holds key material of its own.

mod cose;
mod envelope;
mod keys;

pub use cose::{decode_cose, sign_cose, verify_cose, CoseSign1};
pub use envelope::{
    decode_envelope, encode_envelope, sign_envelope, verify_envelope, EnvelopePayload,
    SignedEnvelope,
};
pub use keys::{
    generate_keypair, signing_key_from_bytes, signing_key_from_pem, signing_key_to_pem,
    verifying_key_from_bytes, verifying_key_from_pem, verifying_key_to_pem, ZeroizingSigningKey,
};

use ed25519_dalek::VerifyingKey;

/// Maps a signer id to its verification key. Implementations must be pure
/// with respect to any one verify call.
pub trait KeyResolver {
    fn resolve(&self, signer_id: &str) -> Option<VerifyingKey>;
}

impl<F> KeyResolver for F
where
    F: Fn(&str) -> Option<VerifyingKey>,
{
    fn resolve(&self, signer_id: &str) -> Option<VerifyingKey> {
        self(signer_id)
    }
}
