//! Glyphseal Core - signed provenance metadata inside Unicode text
//!
//! This crate embeds cryptographically-signed provenance metadata into
//! plain text without changing how the text renders, and verifies it
//! later. The carrier is the Unicode variation-selector space: every
//! payload byte maps onto an invisible selector scalar, and a C2PA
//! manifest rides at the end of the text behind a U+FEFF sentinel.
//!
//! # Features
//!
//! - Byte <-> variation-selector codec over U+FE00..U+FE0F and
//!   U+E0100..U+E01EF
//! - C2PA manifest pipeline: canonical CBOR, COSE_Sign1 (Ed25519), JUMBF
//!   packaging, soft and hard content bindings
//! - Legacy flat and manifest payloads over a domain-separated signed
//!   envelope with configurable in-text placement
//! - Streaming embedder for chunked producers
//! - Lossless interop bridge to external C2PA-shaped dictionaries
//!
//! # Example
//!
//! ```
//! use glyphseal_core::{
//!     embed_metadata, verify_metadata, generate_keypair, Action, C2paFields,
//!     EmbedOptions, PayloadSpec, VerifyOptions,
//! };
//!
//! # fn main() -> glyphseal_core::Result<()> {
//! let (signing_key, verifying_key) = generate_keypair();
//!
//! let payload = PayloadSpec::C2pa(C2paFields {
//!     actions: vec![Action::new("c2pa.created").with_when("2025-01-01T00:00:00Z")],
//!     ..C2paFields::default()
//! });
//! let sealed = embed_metadata(
//!     "Hello, world.",
//!     &payload,
//!     &signing_key,
//!     "signer-1",
//!     &EmbedOptions::default(),
//! )?;
//! assert!(sealed.starts_with("Hello, world."));
//!
//! let resolver = move |_: &str| Some(verifying_key);
//! let verification = verify_metadata(&sealed, &resolver, &VerifyOptions::default())?;
//! assert!(verification.is_valid);
//! # Ok(())
//! # }
//! ```

pub mod c2pa;
pub mod canonical;
pub mod config;
pub mod embed;
pub mod error;
pub mod hashing;
pub mod payload;
pub mod selector;
pub mod sign;
pub mod site;
pub mod streaming;
pub mod wrapper;

// Re-export main types for convenience
pub use c2pa::{
    external_to_internal, internal_to_external, Action, C2paAssertion, C2paFields, C2paManifest,
};
pub use config::EngineConfig;
pub use embed::{
    embed_metadata, extract_metadata, verify_metadata, EmbedOptions, Verification, VerifyOptions,
};
pub use error::{GlyphsealError, Result, CURRENT_WRAPPER_VERSION, MAX_MANIFEST_SIZE};
pub use hashing::ExclusionRange;
pub use payload::{
    BasicPayload, LegacyAssertion, LegacyManifest, MetadataFormat, PayloadSpec, PayloadView,
    Timestamp,
};
pub use sign::{generate_keypair, KeyResolver, ZeroizingSigningKey};
pub use site::MetadataTarget;
pub use streaming::{StreamingHandler, StreamingOptions};
