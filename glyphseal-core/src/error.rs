use thiserror::Error;

/// Wrapper format version this crate emits and accepts.
pub const CURRENT_WRAPPER_VERSION: u8 = 1;

/// Maximum manifest store size that fits the wrapper's 4-byte length field.
pub const MAX_MANIFEST_SIZE: u64 = u32::MAX as u64;

/// Upper bound for the hard-binding exclusion fixed point.
pub const MAX_FIXED_POINT_ITERATIONS: usize = 4;

#[derive(Debug, Error)]
pub enum GlyphsealError {
    /// Caller input outside its declared range (bad timestamp, oversized
    /// manifest, empty signer id, zero fanout, ...).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Overlapping, out-of-order, or out-of-bounds exclusion ranges.
    #[error("invalid exclusion range: {0}")]
    InvalidExclusion(String),

    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    /// The resolver returned no verification key for the signer id carried
    /// in the envelope.
    #[error("unknown signer: {signer_id}")]
    UnknownSigner { signer_id: String },

    #[error("signature verification failed")]
    BadSignature,

    /// COSE / CBOR / JSON structure could not be parsed.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// A selector run decoded but the magic/version/length invariants of
    /// the wrapper header failed.
    #[error("corrupted wrapper: {0}")]
    CorruptedWrapper(String),

    #[error("multiple decodable wrappers found in text")]
    MultipleWrappers,

    /// Legacy site selection could not place the payload.
    #[error("no viable embedding site for target '{target}': {available} of {needed} required sites")]
    NoViableSite {
        target: String,
        needed: usize,
        available: usize,
    },

    #[error("unsupported metadata format: {0}")]
    UnsupportedFormat(String),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("hard-binding exclusion fixed point did not converge after {iterations} iterations")]
    ExclusionFixedPointDivergence { iterations: usize },

    #[error("soft binding hash mismatch")]
    SoftBindingMismatch,

    #[error("hard binding hash mismatch")]
    HardBindingMismatch,
}

pub type Result<T> = std::result::Result<T, GlyphsealError>;
