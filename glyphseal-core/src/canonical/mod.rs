//! Canonical serialization for signing input.
//!
//! Signatures cover bytes, not values, so both the JSON and the CBOR paths
//! must emit one byte string per semantic value: sorted map keys, shortest
//! integer forms, no floats, no insignificant whitespace. Two semantically
//! equal payloads always serialize identically.

mod cbor;
mod json;

pub use cbor::{canonical_cbor_bytes, to_canonical_cbor};
pub use json::canonical_json_bytes;

/// Nesting bound shared by both serializers.
pub const MAX_DEPTH: usize = 128;
