//! Streaming embedder.
//!
//! Buffers chunked producer output until the buffered text offers a viable
//! site, embeds the signed payload exactly once, then passes everything
//! else through untouched. C2PA streaming is not supported: hard binding
//! cannot be computed over an unfinished stream, and the legacy envelope's
//! signature covers only the payload bytes, so it stays valid across the
//! concatenated session output.
//!
//! A handler owns one session's state and is not safe to share across
//! threads; independent handlers may run concurrently.

use ed25519_dalek::SigningKey;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::embed::{embed_metadata, EmbedOptions};
use crate::error::{GlyphsealError, Result};
use crate::payload::PayloadSpec;
use crate::sign::ZeroizingSigningKey;
use crate::site::{has_viable_site, MetadataTarget};

/// Options for a streaming session.
#[derive(Debug, Clone)]
pub struct StreamingOptions {
    pub target: MetadataTarget,
    /// Embed into the earliest chunk that admits a site (the only supported
    /// mode; kept as an explicit knob for API compatibility).
    pub encode_first_chunk_only: bool,
    pub distribute_across_targets: bool,
    pub omit_keys: Vec<String>,
    pub config: EngineConfig,
}

impl Default for StreamingOptions {
    fn default() -> Self {
        Self {
            target: MetadataTarget::Whitespace,
            encode_first_chunk_only: true,
            distribute_across_targets: false,
            omit_keys: Vec::new(),
            config: EngineConfig::default(),
        }
    }
}

/// Per-session streaming state. The private key is held zeroizing and
/// wiped when the handler drops.
#[derive(Debug)]
pub struct StreamingHandler {
    payload: PayloadSpec,
    key: ZeroizingSigningKey,
    signer_id: String,
    options: StreamingOptions,
    buffer: String,
    embedded: bool,
}

impl StreamingHandler {
    /// Create a handler for one logical stream.
    ///
    /// C2PA payloads are rejected with `UnsupportedFormat`.
    pub fn new(
        payload: PayloadSpec,
        key: &SigningKey,
        signer_id: impl Into<String>,
        options: StreamingOptions,
    ) -> Result<Self> {
        if matches!(payload, PayloadSpec::C2pa(_)) {
            return Err(GlyphsealError::UnsupportedFormat(
                "c2pa streaming is not supported: hard binding needs the finished text".into(),
            ));
        }
        let signer_id = signer_id.into();
        if signer_id.is_empty() {
            return Err(GlyphsealError::InvalidInput(
                "signer_id must be a non-empty string".into(),
            ));
        }
        Ok(Self {
            payload,
            key: ZeroizingSigningKey::new(key),
            signer_id,
            options,
            buffer: String::new(),
            embedded: false,
        })
    }

    /// Whether the payload has been embedded in this session.
    pub fn has_embedded(&self) -> bool {
        self.embedded
    }

    fn embed_options(&self) -> EmbedOptions {
        EmbedOptions {
            target: self.options.target,
            distribute_across_targets: self.options.distribute_across_targets,
            omit_keys: self.options.omit_keys.clone(),
            add_hard_binding: Some(false),
            config: self.options.config.clone(),
        }
    }

    /// Try to embed into the current buffer. "No viable site yet" is an
    /// expected outcome, not an error.
    fn try_embed(&mut self) -> Result<Option<String>> {
        if !has_viable_site(&self.buffer, self.options.target) {
            return Ok(None);
        }
        let key = self.key.signing_key();
        match embed_metadata(
            &self.buffer,
            &self.payload,
            &key,
            &self.signer_id,
            &self.embed_options(),
        ) {
            Ok(text) => {
                self.embedded = true;
                self.buffer.clear();
                info!(signer_id = %self.signer_id, "embedded payload into stream");
                Ok(Some(text))
            }
            Err(GlyphsealError::NoViableSite { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Feed one chunk; returns the text to emit for it (possibly empty
    /// while buffering, possibly more than the chunk once a site appears).
    pub fn process_chunk(&mut self, chunk: &str) -> Result<String> {
        self.buffer.push_str(chunk);
        if self.embedded {
            return Ok(std::mem::take(&mut self.buffer));
        }
        match self.try_embed()? {
            Some(text) => Ok(text),
            None => {
                debug!(buffered = self.buffer.len(), "no viable site yet, buffering");
                Ok(String::new())
            }
        }
    }

    /// Flush the session. One final embed attempt runs against whatever is
    /// buffered; if no site exists the raw buffer is returned and the
    /// stream simply carries no provenance. Resets the session either way.
    pub fn finalize(&mut self) -> Result<String> {
        let result = if self.embedded || self.buffer.is_empty() {
            Ok(std::mem::take(&mut self.buffer))
        } else {
            match self.try_embed()? {
                Some(text) => Ok(text),
                None => Ok(std::mem::take(&mut self.buffer)),
            }
        };
        self.reset();
        result
    }

    /// Clear buffer and state. The only in-band cancellation; output
    /// already emitted cannot be retracted.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.embedded = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::{verify_metadata, VerifyOptions};
    use crate::payload::{BasicPayload, PayloadView};
    use crate::selector::strip_selectors;
    use crate::sign::generate_keypair;
    use ed25519_dalek::VerifyingKey;

    fn resolver_for(key: VerifyingKey) -> impl Fn(&str) -> Option<VerifyingKey> {
        move |_: &str| Some(key)
    }

    fn basic_payload() -> PayloadSpec {
        PayloadSpec::Basic(BasicPayload {
            model_id: Some("streamer".into()),
            ..BasicPayload::default()
        })
    }

    fn no_hard_binding() -> VerifyOptions {
        VerifyOptions {
            require_hard_binding: false,
            ..VerifyOptions::default()
        }
    }

    #[test]
    fn embeds_in_first_viable_chunk_and_passes_rest_through() {
        let (signing, verifying) = generate_keypair();
        let mut handler = StreamingHandler::new(
            basic_payload(),
            &signing,
            "s1",
            StreamingOptions::default(),
        )
        .unwrap();

        let first = handler.process_chunk("alpha ").unwrap();
        assert!(handler.has_embedded());
        assert_ne!(first, "alpha ");
        assert_eq!(strip_selectors(&first), "alpha ");

        let second = handler.process_chunk("beta ").unwrap();
        assert_eq!(second, "beta ");
        let third = handler.process_chunk("gamma").unwrap();
        assert_eq!(third, "gamma");

        let tail = handler.finalize().unwrap();
        assert!(tail.is_empty());

        let full = format!("{first}{second}{third}{tail}");
        assert_eq!(strip_selectors(&full), "alpha beta gamma");

        let verification =
            verify_metadata(&full, &resolver_for(verifying), &no_hard_binding()).unwrap();
        assert!(verification.is_valid);
        assert!(matches!(verification.payload, Some(PayloadView::Basic(_))));
    }

    #[test]
    fn buffers_until_a_site_appears() {
        let (signing, verifying) = generate_keypair();
        let mut handler = StreamingHandler::new(
            basic_payload(),
            &signing,
            "s1",
            StreamingOptions::default(),
        )
        .unwrap();

        // No whitespace yet: everything is withheld.
        assert_eq!(handler.process_chunk("abc").unwrap(), "");
        assert_eq!(handler.process_chunk("def").unwrap(), "");
        assert!(!handler.has_embedded());

        // The space unlocks the buffered text in one piece.
        let emitted = handler.process_chunk("ghi jkl").unwrap();
        assert!(handler.has_embedded());
        assert_eq!(strip_selectors(&emitted), "abcdefghi jkl");

        let tail = handler.finalize().unwrap();
        assert!(tail.is_empty());

        let verification = verify_metadata(
            &emitted,
            &resolver_for(verifying),
            &no_hard_binding(),
        )
        .unwrap();
        assert!(verification.is_valid);
    }

    #[test]
    fn finalize_embeds_as_last_resort() {
        let (signing, verifying) = generate_keypair();
        let mut handler = StreamingHandler::new(
            basic_payload(),
            &signing,
            "s1",
            StreamingOptions {
                target: MetadataTarget::EndOfText,
                ..StreamingOptions::default()
            },
        )
        .unwrap();

        // EndOfText always embeds immediately, so use a fresh handler with
        // whitespace target and siteless chunks instead.
        handler.options.target = MetadataTarget::Whitespace;
        assert_eq!(handler.process_chunk("abc").unwrap(), "");

        handler.options.target = MetadataTarget::EndOfText;
        let tail = handler.finalize().unwrap();
        assert!(handler.buffer.is_empty());
        assert_eq!(strip_selectors(&tail), "abc");

        let verification =
            verify_metadata(&tail, &resolver_for(verifying), &no_hard_binding()).unwrap();
        assert!(verification.is_valid);
    }

    #[test]
    fn finalize_without_site_returns_raw_buffer() {
        let (signing, _) = generate_keypair();
        let mut handler = StreamingHandler::new(
            basic_payload(),
            &signing,
            "s1",
            StreamingOptions::default(),
        )
        .unwrap();

        assert_eq!(handler.process_chunk("abc").unwrap(), "");
        let tail = handler.finalize().unwrap();
        assert_eq!(tail, "abc");
        assert!(!handler.has_embedded());
    }

    #[test]
    fn c2pa_payload_is_rejected() {
        let (signing, _) = generate_keypair();
        let err = StreamingHandler::new(
            PayloadSpec::C2pa(crate::c2pa::C2paFields::default()),
            &signing,
            "s1",
            StreamingOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, GlyphsealError::UnsupportedFormat(_)));
    }

    #[test]
    fn reset_cancels_a_session() {
        let (signing, _) = generate_keypair();
        let mut handler = StreamingHandler::new(
            basic_payload(),
            &signing,
            "s1",
            StreamingOptions::default(),
        )
        .unwrap();
        assert_eq!(handler.process_chunk("abc").unwrap(), "");
        handler.reset();
        assert_eq!(handler.finalize().unwrap(), "");
        assert!(!handler.has_embedded());
    }

    #[test]
    fn concatenation_preserves_input_text() {
        let (signing, _) = generate_keypair();
        let mut handler = StreamingHandler::new(
            basic_payload(),
            &signing,
            "s1",
            StreamingOptions::default(),
        )
        .unwrap();

        let chunks = ["The quick ", "brown fox ", "jumps."];
        let mut emitted = String::new();
        for chunk in chunks {
            emitted.push_str(&handler.process_chunk(chunk).unwrap());
        }
        emitted.push_str(&handler.finalize().unwrap());
        assert_eq!(strip_selectors(&emitted), chunks.concat());
    }
}
