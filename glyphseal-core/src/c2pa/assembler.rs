//! Builds, signs, and verifies the wrapped C2PA manifest.
//!
//! Embedding iterates to a fixed point: the hard-binding assertion records
//! an exclusion covering the wrapper itself, the wrapper's length depends
//! on the signed manifest store, and the store's length depends on the
//! serialized exclusion. The exclusion length changes serialized width at
//! most once more after the first round, so the loop is capped at
//! [`MAX_FIXED_POINT_ITERATIONS`].

use ed25519_dalek::SigningKey;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::canonical::to_canonical_cbor;
use crate::config::EngineConfig;
use crate::error::{GlyphsealError, Result, MAX_FIXED_POINT_ITERATIONS};
use crate::hashing::{self, ExclusionRange};
use crate::payload::PayloadView;
use crate::sign::{decode_cose, sign_cose, verify_cose, KeyResolver};
use crate::wrapper;

use super::jumbf;
use super::manifest::{
    actions_assertion, hard_binding_assertion, soft_binding_assertion, Action, C2paFields,
    C2paManifest, ACTIONS_LABEL, HARD_BINDING_LABEL, SOFT_BINDING_LABEL,
};

/// Outcome of a verification pass. `Err` is reserved for `InvalidInput`;
/// every in-band failure lands in `failure` with `is_valid == false`.
#[derive(Debug)]
pub struct Verification {
    pub is_valid: bool,
    pub signer_id: Option<String>,
    pub payload: Option<PayloadView>,
    pub failure: Option<GlyphsealError>,
}

impl Verification {
    pub(crate) fn valid(signer_id: String, payload: PayloadView) -> Self {
        Self {
            is_valid: true,
            signer_id: Some(signer_id),
            payload: Some(payload),
            failure: None,
        }
    }

    pub(crate) fn invalid(
        failure: GlyphsealError,
        signer_id: Option<String>,
        payload: Option<PayloadView>,
    ) -> Self {
        Self {
            is_valid: false,
            signer_id,
            payload,
            failure: Some(failure),
        }
    }
}

fn default_claim_generator() -> String {
    format!("glyphseal/{}", env!("CARGO_PKG_VERSION"))
}

fn resolved_actions(fields: &C2paFields, claim_generator: &str) -> Vec<Action> {
    if !fields.actions.is_empty() {
        return fields.actions.clone();
    }
    let mut created = Action::new("c2pa.created").with_software_agent(claim_generator);
    created.when = fields.timestamp.clone();
    created.digital_source_type =
        Some("http://cv.iptc.org/newscodes/digitalsourcetype/trainedAlgorithmicMedia".into());
    vec![created]
}

fn soft_binding_hash(actions: &[Action]) -> Result<String> {
    let cbor = to_canonical_cbor(&actions)?;
    Ok(hex::encode(Sha256::digest(&cbor)))
}

/// Sign `fields` over `text` and return the text with the wrapper appended.
pub fn embed_c2pa(
    text: &str,
    fields: &C2paFields,
    key: &SigningKey,
    signer_id: &str,
    add_hard_binding: bool,
    config: &EngineConfig,
) -> Result<String> {
    let claim_generator = fields
        .claim_generator
        .clone()
        .unwrap_or_else(default_claim_generator);
    let actions = resolved_actions(fields, &claim_generator);
    let instance_id = fields
        .instance_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let mut manifest = C2paManifest {
        context: config.emitted_context().to_string(),
        instance_id,
        claim_generator,
        assertions: vec![
            actions_assertion(&actions)?,
            soft_binding_assertion(&soft_binding_hash(&actions)?),
        ],
        ai_assertion: fields.ai_assertion.clone(),
        custom_claims: fields.custom_claims.clone(),
    };

    let manifest_store = if add_hard_binding {
        let content = hashing::hash_with_exclusions(text, &[])?;
        let content_len = content.normalized.len();

        // The exclusion in the final text always filters down to exactly the
        // normalized content, so the digest is fixed; only the recorded
        // exclusion length has to reach a fixed point.
        let mut wrapper_len = wrapper::wrapper_utf8_len(&[]);
        let mut converged = None;
        for iteration in 0..MAX_FIXED_POINT_ITERATIONS {
            let exclusions = [ExclusionRange::new(content_len, wrapper_len)];
            manifest.set_assertion(hard_binding_assertion(&content.hex, &exclusions));

            let cose = sign_cose(&manifest.to_cbor()?, key, signer_id)?;
            let store = jumbf::pack(&cose);
            let actual_len = wrapper::wrapper_utf8_len(&store);
            debug!(iteration, wrapper_len, actual_len, "hard-binding fixed point");
            if actual_len == wrapper_len {
                converged = Some(store);
                break;
            }
            wrapper_len = actual_len;
        }
        converged.ok_or(GlyphsealError::ExclusionFixedPointDivergence {
            iterations: MAX_FIXED_POINT_ITERATIONS,
        })?
    } else {
        jumbf::pack(&sign_cose(&manifest.to_cbor()?, key, signer_id)?)
    };

    let wrapper_text = wrapper::encode_wrapper(&manifest_store)?;
    info!(signer_id, store_len = manifest_store.len(), "embedded C2PA manifest");
    Ok(format!("{text}{wrapper_text}"))
}

/// Options honored by [`verify_c2pa`].
pub struct C2paVerifyOptions<'a> {
    pub require_hard_binding: bool,
    pub return_payload_on_failure: bool,
    pub config: &'a EngineConfig,
}

fn parse_unverified(payload: &[u8]) -> Option<PayloadView> {
    C2paManifest::from_cbor(payload).ok().map(PayloadView::C2pa)
}

/// Verify a manifest store extracted from `full_text`.
///
/// `full_text` is the complete input, wrapper included; the hard-binding
/// recompute relies on the recorded exclusions to skip the wrapper bytes.
pub fn verify_c2pa(
    full_text: &str,
    manifest_store: &[u8],
    resolver: &dyn KeyResolver,
    options: &C2paVerifyOptions<'_>,
) -> Verification {
    let cose_bytes = match jumbf::unpack(manifest_store) {
        Ok(bytes) => bytes,
        Err(e) => return Verification::invalid(e, None, None),
    };
    let cose = match decode_cose(&cose_bytes) {
        Ok(cose) => cose,
        Err(e) => return Verification::invalid(e, None, None),
    };
    let signer_id = cose.signer_id.clone();
    let on_failure = |opts: &C2paVerifyOptions<'_>| {
        if opts.return_payload_on_failure {
            parse_unverified(&cose.payload)
        } else {
            None
        }
    };

    let key = match resolver.resolve(&signer_id) {
        Some(key) => key,
        None => {
            warn!(%signer_id, "no verification key for signer");
            return Verification::invalid(
                GlyphsealError::UnknownSigner {
                    signer_id: signer_id.clone(),
                },
                Some(signer_id),
                on_failure(options),
            );
        }
    };

    if let Err(e) = verify_cose(&cose, &key) {
        warn!(%signer_id, "COSE signature check failed");
        return Verification::invalid(e, Some(signer_id), on_failure(options));
    }

    let manifest = match C2paManifest::from_cbor(&cose.payload) {
        Ok(manifest) => manifest,
        Err(e) => return Verification::invalid(e, Some(signer_id), None),
    };

    if !options.config.accepts_context(&manifest.context) {
        warn!(context = %manifest.context, "manifest @context not in allowlist");
        return Verification::invalid(
            GlyphsealError::InvalidPayload(format!(
                "manifest @context '{}' is not accepted",
                manifest.context
            )),
            Some(signer_id),
            Some(PayloadView::C2pa(manifest)),
        );
    }

    let mut required = vec![ACTIONS_LABEL, SOFT_BINDING_LABEL];
    if options.require_hard_binding {
        required.push(HARD_BINDING_LABEL);
    }
    for label in required {
        if manifest.assertion(label).is_none() {
            return Verification::invalid(
                GlyphsealError::InvalidPayload(format!("manifest missing assertion {label}")),
                Some(signer_id),
                Some(PayloadView::C2pa(manifest)),
            );
        }
    }

    // Soft binding: the actions list must hash to the recorded digest.
    let soft = match soft_binding_check(&manifest) {
        Ok(()) => None,
        Err(e) => Some(e),
    };
    if let Some(e) = soft {
        warn!(%signer_id, "soft binding mismatch");
        return Verification::invalid(e, Some(signer_id), Some(PayloadView::C2pa(manifest)));
    }

    // Hard binding: rehash the full input with the recorded exclusions.
    if options.require_hard_binding {
        if let Err(e) = hard_binding_check(full_text, &manifest) {
            warn!(%signer_id, "hard binding mismatch");
            return Verification::invalid(e, Some(signer_id), Some(PayloadView::C2pa(manifest)));
        }
    }

    info!(%signer_id, "C2PA manifest verified");
    Verification::valid(signer_id, PayloadView::C2pa(manifest))
}

fn soft_binding_check(manifest: &C2paManifest) -> Result<()> {
    let assertion = manifest
        .assertion(SOFT_BINDING_LABEL)
        .ok_or(GlyphsealError::SoftBindingMismatch)?;
    let recorded = assertion
        .data
        .get("hash")
        .and_then(|v| v.as_str())
        .ok_or(GlyphsealError::SoftBindingMismatch)?;
    let actions = manifest.actions()?;
    let actual = soft_binding_hash(&actions)?;
    if recorded != actual {
        return Err(GlyphsealError::SoftBindingMismatch);
    }
    Ok(())
}

fn hard_binding_check(full_text: &str, manifest: &C2paManifest) -> Result<()> {
    let assertion = manifest
        .assertion(HARD_BINDING_LABEL)
        .ok_or(GlyphsealError::HardBindingMismatch)?;
    let recorded = assertion
        .data
        .get("hash")
        .and_then(|v| v.as_str())
        .ok_or(GlyphsealError::HardBindingMismatch)?;
    let exclusions = manifest.hard_binding_exclusions()?;
    let actual = hashing::hash_with_exclusions(full_text, &exclusions)?;
    if recorded != actual.hex {
        return Err(GlyphsealError::HardBindingMismatch);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sign::generate_keypair;
    use ed25519_dalek::VerifyingKey;

    fn resolver_for(key: VerifyingKey) -> impl Fn(&str) -> Option<VerifyingKey> {
        move |_: &str| Some(key)
    }

    fn fields() -> C2paFields {
        C2paFields {
            actions: vec![Action::new("c2pa.created").with_when("2025-01-01T00:00:00Z")],
            instance_id: Some("11111111-2222-4333-8444-555555555555".into()),
            ..C2paFields::default()
        }
    }

    fn verify_options(config: &EngineConfig) -> C2paVerifyOptions<'_> {
        C2paVerifyOptions {
            require_hard_binding: true,
            return_payload_on_failure: false,
            config,
        }
    }

    #[test]
    fn embed_then_verify_round_trip() {
        let (signing, verifying) = generate_keypair();
        let config = EngineConfig::default();
        let out = embed_c2pa("Hello, world.", &fields(), &signing, "s1", true, &config).unwrap();
        assert!(out.starts_with("Hello, world."));

        let decoded = wrapper::find_and_decode(&out).unwrap().unwrap();
        let verification = verify_c2pa(
            &out,
            &decoded.manifest_bytes,
            &resolver_for(verifying),
            &verify_options(&config),
        );
        assert!(verification.is_valid, "failure: {:?}", verification.failure);
        assert_eq!(verification.signer_id.as_deref(), Some("s1"));

        let manifest = verification.payload.unwrap();
        let manifest = manifest.as_c2pa().unwrap();
        assert!(manifest.assertion(HARD_BINDING_LABEL).is_some());
        let actions = manifest.actions().unwrap();
        assert_eq!(actions, fields().actions);
    }

    #[test]
    fn embedding_is_deterministic_with_fixed_instance_id() {
        let (signing, _) = generate_keypair();
        let config = EngineConfig::default();
        let a = embed_c2pa("text", &fields(), &signing, "s1", true, &config).unwrap();
        let b = embed_c2pa("text", &fields(), &signing, "s1", true, &config).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn exclusion_matches_wrapper_extent() {
        let (signing, verifying) = generate_keypair();
        let config = EngineConfig::default();
        let text = "Caf\u{00E9} \u{00F1} body";
        let out = embed_c2pa(text, &fields(), &signing, "s1", true, &config).unwrap();

        let decoded = wrapper::find_and_decode(&out).unwrap().unwrap();
        let verification = verify_c2pa(
            &out,
            &decoded.manifest_bytes,
            &resolver_for(verifying),
            &verify_options(&config),
        );
        assert!(verification.is_valid);

        let manifest = verification.payload.unwrap();
        let exclusions = manifest.as_c2pa().unwrap().hard_binding_exclusions().unwrap();
        assert_eq!(exclusions.len(), 1);
        let normalized_full = hashing::normalize(&out);
        assert_eq!(
            exclusions[0].start + exclusions[0].length,
            normalized_full.len()
        );
        assert_eq!(exclusions[0].start, hashing::normalize(text).len());
    }

    #[test]
    fn empty_text_round_trip() {
        let (signing, verifying) = generate_keypair();
        let config = EngineConfig::default();
        let out = embed_c2pa("", &fields(), &signing, "s1", true, &config).unwrap();
        assert_eq!(out.chars().next(), Some('\u{FEFF}'));
        assert!(out.chars().skip(1).all(crate::selector::is_selector));

        let decoded = wrapper::find_and_decode(&out).unwrap().unwrap();
        let verification = verify_c2pa(
            &out,
            &decoded.manifest_bytes,
            &resolver_for(verifying),
            &verify_options(&config),
        );
        assert!(verification.is_valid);
    }

    #[test]
    fn default_action_is_created_without_when() {
        let (signing, verifying) = generate_keypair();
        let config = EngineConfig::default();
        let fields = C2paFields {
            instance_id: Some("11111111-2222-4333-8444-555555555555".into()),
            ..C2paFields::default()
        };
        let out = embed_c2pa("x", &fields, &signing, "s1", true, &config).unwrap();
        let decoded = wrapper::find_and_decode(&out).unwrap().unwrap();
        let verification = verify_c2pa(
            &out,
            &decoded.manifest_bytes,
            &resolver_for(verifying),
            &verify_options(&config),
        );
        let manifest = verification.payload.unwrap();
        let actions = manifest.as_c2pa().unwrap().actions().unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].label, "c2pa.created");
        assert!(actions[0].when.is_none());
    }

    #[test]
    fn unknown_signer_is_reported() {
        let (signing, _) = generate_keypair();
        let config = EngineConfig::default();
        let out = embed_c2pa("text", &fields(), &signing, "who", true, &config).unwrap();
        let decoded = wrapper::find_and_decode(&out).unwrap().unwrap();

        let no_keys = |_: &str| None::<VerifyingKey>;
        let verification = verify_c2pa(&out, &decoded.manifest_bytes, &no_keys, &verify_options(&config));
        assert!(!verification.is_valid);
        assert_eq!(verification.signer_id.as_deref(), Some("who"));
        assert!(matches!(
            verification.failure,
            Some(GlyphsealError::UnknownSigner { .. })
        ));
    }

    #[test]
    fn foreign_context_is_rejected() {
        let (signing, verifying) = generate_keypair();
        let emit_config = EngineConfig {
            context_url: Some("https://example.com/own.jsonld".into()),
            ..EngineConfig::default()
        };
        let out = embed_c2pa("text", &fields(), &signing, "s1", true, &emit_config).unwrap();
        let decoded = wrapper::find_and_decode(&out).unwrap().unwrap();

        let strict = EngineConfig::default();
        let verification = verify_c2pa(
            &out,
            &decoded.manifest_bytes,
            &resolver_for(verifying),
            &verify_options(&strict),
        );
        assert!(!verification.is_valid);
        assert!(matches!(
            verification.failure,
            Some(GlyphsealError::InvalidPayload(_))
        ));
    }
}
