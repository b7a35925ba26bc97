//! C2PA manifest pipeline.
//!
//! The format's primary carrier: a typed manifest model, a JUMBF container
//! around the COSE_Sign1 envelope, the embed/verify assembler with its
//! hard-binding fixed point, and the interop bridge to external
//! C2PA-shaped dictionaries.

mod assembler;
mod bridge;
mod jumbf;
mod manifest;

pub use assembler::{embed_c2pa, verify_c2pa, C2paVerifyOptions, Verification};
pub use bridge::{external_to_internal, internal_to_external, DATA_ENCODING_CBOR_BASE64};
pub use jumbf::{pack as pack_manifest_store, unpack as unpack_manifest_store};
pub use manifest::{
    actions_assertion, hard_binding_assertion, soft_binding_assertion, Action, C2paAssertion,
    C2paFields, C2paManifest, ACTIONS_LABEL, HARD_BINDING_LABEL, SOFT_BINDING_ALGORITHM_ID,
    SOFT_BINDING_LABEL,
};
