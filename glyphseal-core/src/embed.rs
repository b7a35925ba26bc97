//! Public embedding, extraction, and verification entry points.
//!
//! `embed_metadata` surfaces every error; `extract_metadata` never fails
//! (absent or malformed payloads are `None`); `verify_metadata` reports all
//! cryptographic and structural failures in-band and reserves `Err` for
//! invalid caller input.

use ed25519_dalek::SigningKey;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::c2pa::{self, C2paVerifyOptions};
use crate::config::EngineConfig;
use crate::error::{GlyphsealError, Result};
use crate::payload::{
    omit_keys, BasicPayload, LegacyManifest, MetadataFormat, PayloadSpec, PayloadView, Timestamp,
};
use crate::selector::collect_selector_bytes;
use crate::sign::{
    decode_envelope, encode_envelope, sign_envelope, verify_envelope, EnvelopePayload, KeyResolver,
    SignedEnvelope,
};
use crate::site::{embed_distributed, embed_single_site, MetadataTarget};
use crate::wrapper;
use crate::canonical::to_canonical_cbor;

pub use crate::c2pa::Verification;

/// Options for [`embed_metadata`].
#[derive(Debug, Clone)]
pub struct EmbedOptions {
    /// Site policy for the legacy formats. C2PA output ignores this and
    /// always appends the wrapper.
    pub target: MetadataTarget,
    pub distribute_across_targets: bool,
    /// Keys stripped recursively from Basic payloads before signing.
    pub omit_keys: Vec<String>,
    /// `None` falls back to the configured default. Streaming forces
    /// `Some(false)`.
    pub add_hard_binding: Option<bool>,
    pub config: EngineConfig,
}

impl Default for EmbedOptions {
    fn default() -> Self {
        Self {
            target: MetadataTarget::Whitespace,
            distribute_across_targets: false,
            omit_keys: Vec::new(),
            add_hard_binding: None,
            config: EngineConfig::default(),
        }
    }
}

/// Options for [`verify_metadata`].
#[derive(Debug, Clone)]
pub struct VerifyOptions {
    /// Enforce the hard-binding assertion. Must be disabled for streamed
    /// content, whose hash covers an unfinished stream.
    pub require_hard_binding: bool,
    pub return_payload_on_failure: bool,
    pub config: EngineConfig,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            require_hard_binding: true,
            return_payload_on_failure: false,
            config: EngineConfig::default(),
        }
    }
}

fn normalized_basic(payload: &BasicPayload, keys_to_omit: &[String]) -> Result<Value> {
    let mut payload = payload.clone();
    if let Some(ts) = &payload.timestamp {
        payload.timestamp = Some(ts.normalized()?);
    }
    let mut value = serde_json::to_value(&payload)
        .map_err(|e| GlyphsealError::InvalidPayload(format!("basic payload: {e}")))?;
    omit_keys(&mut value, keys_to_omit);
    Ok(value)
}

fn normalized_legacy(manifest: &LegacyManifest) -> Result<LegacyManifest> {
    let mut manifest = manifest.clone();
    if let Some(ts) = &manifest.timestamp {
        manifest.timestamp = Some(Timestamp::Iso(ts.clone()).to_iso_utc()?);
    }
    Ok(manifest)
}

fn place_envelope(
    text: &str,
    envelope: &SignedEnvelope,
    options: &EmbedOptions,
) -> Result<String> {
    let bytes = encode_envelope(envelope)?;
    debug!(len = bytes.len(), target = %options.target, "placing legacy envelope");
    if options.distribute_across_targets {
        embed_distributed(
            text,
            options.target,
            &bytes,
            options.config.distribution_fanout,
        )
    } else {
        embed_single_site(text, options.target, &bytes)
    }
}

/// Embed a signed payload into `text` and return the new owned text.
pub fn embed_metadata(
    text: &str,
    payload: &PayloadSpec,
    key: &SigningKey,
    signer_id: &str,
    options: &EmbedOptions,
) -> Result<String> {
    if signer_id.is_empty() {
        return Err(GlyphsealError::InvalidInput(
            "signer_id must be a non-empty string".into(),
        ));
    }

    match payload {
        PayloadSpec::C2pa(fields) => {
            let add_hard_binding = options
                .add_hard_binding
                .unwrap_or(options.config.hard_binding_default);
            c2pa::embed_c2pa(text, fields, key, signer_id, add_hard_binding, &options.config)
        }
        PayloadSpec::Basic(basic) => {
            let value = normalized_basic(basic, &options.omit_keys)?;
            let envelope = sign_envelope(
                MetadataFormat::Basic,
                &EnvelopePayload::Json(value),
                key,
                signer_id,
            )?;
            place_envelope(text, &envelope, options)
        }
        PayloadSpec::ManifestJson(manifest) => {
            let manifest = normalized_legacy(manifest)?;
            let value = serde_json::to_value(&manifest)
                .map_err(|e| GlyphsealError::InvalidPayload(format!("manifest payload: {e}")))?;
            let envelope = sign_envelope(
                MetadataFormat::ManifestJson,
                &EnvelopePayload::Json(value),
                key,
                signer_id,
            )?;
            place_envelope(text, &envelope, options)
        }
        PayloadSpec::ManifestCbor(manifest) => {
            let manifest = normalized_legacy(manifest)?;
            let bytes = to_canonical_cbor(&manifest)?;
            let envelope = sign_envelope(
                MetadataFormat::ManifestCbor,
                &EnvelopePayload::Cbor(bytes),
                key,
                signer_id,
            )?;
            place_envelope(text, &envelope, options)
        }
    }
}

fn envelope_view(envelope: &SignedEnvelope) -> Result<PayloadView> {
    match (&envelope.format, &envelope.payload) {
        (MetadataFormat::Basic, EnvelopePayload::Json(value)) => {
            let basic: BasicPayload = serde_json::from_value(value.clone())
                .map_err(|e| GlyphsealError::MalformedEnvelope(format!("basic payload: {e}")))?;
            Ok(PayloadView::Basic(basic))
        }
        (MetadataFormat::ManifestJson, EnvelopePayload::Json(value)) => {
            let manifest: LegacyManifest = serde_json::from_value(value.clone())
                .map_err(|e| GlyphsealError::MalformedEnvelope(format!("manifest payload: {e}")))?;
            Ok(PayloadView::Manifest(manifest))
        }
        (MetadataFormat::ManifestCbor, EnvelopePayload::Cbor(bytes)) => {
            let manifest: LegacyManifest = ciborium::from_reader(bytes.as_slice())
                .map_err(|e| GlyphsealError::MalformedEnvelope(format!("manifest CBOR: {e}")))?;
            Ok(PayloadView::Manifest(manifest))
        }
        _ => Err(GlyphsealError::MalformedEnvelope(
            "envelope format does not match its payload encoding".into(),
        )),
    }
}

fn legacy_envelope_from(text: &str) -> Result<Option<SignedEnvelope>> {
    let bytes = collect_selector_bytes(text);
    if bytes.is_empty() {
        return Ok(None);
    }
    decode_envelope(&bytes).map(Some)
}

/// Extract the embedded payload without verifying anything. Missing or
/// malformed payloads are `None`, never an error.
pub fn extract_metadata(text: &str) -> Option<PayloadView> {
    match wrapper::find_and_decode(text) {
        Ok(Some(decoded)) => {
            let cose_bytes = c2pa::unpack_manifest_store(&decoded.manifest_bytes).ok()?;
            let cose = crate::sign::decode_cose(&cose_bytes).ok()?;
            crate::c2pa::C2paManifest::from_cbor(&cose.payload)
                .ok()
                .map(PayloadView::C2pa)
        }
        Ok(None) => {
            let envelope = legacy_envelope_from(text).ok()??;
            envelope_view(&envelope).ok()
        }
        Err(_) => {
            debug!("wrapper scan failed during extraction");
            None
        }
    }
}

/// Verify the embedded payload against keys provided by `resolver`.
///
/// Returns `Err` only for invalid caller input; every verification failure
/// is reported inside the returned [`Verification`].
pub fn verify_metadata(
    text: &str,
    resolver: &dyn KeyResolver,
    options: &VerifyOptions,
) -> Result<Verification> {
    if text.is_empty() {
        return Ok(Verification::invalid(
            GlyphsealError::MalformedEnvelope("empty input".into()),
            None,
            None,
        ));
    }

    match wrapper::find_and_decode(text) {
        Ok(Some(decoded)) => {
            let c2pa_options = C2paVerifyOptions {
                require_hard_binding: options.require_hard_binding,
                return_payload_on_failure: options.return_payload_on_failure,
                config: &options.config,
            };
            Ok(c2pa::verify_c2pa(
                text,
                &decoded.manifest_bytes,
                resolver,
                &c2pa_options,
            ))
        }
        Ok(None) => verify_legacy(text, resolver, options),
        Err(e) => {
            warn!("wrapper scan failed during verification");
            Ok(Verification::invalid(e, None, None))
        }
    }
}

fn verify_legacy(
    text: &str,
    resolver: &dyn KeyResolver,
    options: &VerifyOptions,
) -> Result<Verification> {
    let envelope = match legacy_envelope_from(text) {
        Ok(Some(envelope)) => envelope,
        Ok(None) => {
            return Ok(Verification::invalid(
                GlyphsealError::MalformedEnvelope("no embedded payload found".into()),
                None,
                None,
            ))
        }
        Err(e) => return Ok(Verification::invalid(e, None, None)),
    };

    let signer_id = envelope.signer_id.clone();
    let payload_view = envelope_view(&envelope).ok();
    let on_failure = |view: Option<PayloadView>| {
        if options.return_payload_on_failure {
            view
        } else {
            None
        }
    };

    let key = match resolver.resolve(&signer_id) {
        Some(key) => key,
        None => {
            warn!(%signer_id, "no verification key for signer");
            return Ok(Verification::invalid(
                GlyphsealError::UnknownSigner {
                    signer_id: signer_id.clone(),
                },
                Some(signer_id),
                on_failure(payload_view),
            ));
        }
    };

    if let Err(e) = verify_envelope(&envelope, &key) {
        warn!(%signer_id, format = %envelope.format, "legacy signature check failed");
        return Ok(Verification::invalid(
            e,
            Some(signer_id),
            on_failure(payload_view),
        ));
    }

    match payload_view {
        Some(view) => {
            info!(%signer_id, format = %envelope.format, "legacy payload verified");
            Ok(Verification::valid(signer_id, view))
        }
        None => Ok(Verification::invalid(
            GlyphsealError::MalformedEnvelope("payload does not parse".into()),
            Some(signer_id),
            None,
        )),
    }
}
