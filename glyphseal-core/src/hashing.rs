//! NFC normalization and exclusion-aware content hashing.
//!
//! Hard binding hashes the NFC-normalized UTF-8 bytes of a text with the
//! wrapper's byte range excluded, so the embedding and verification flows
//! must share one normalization and filtering rule. This module is that
//! rule.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use unicode_normalization::UnicodeNormalization;

use crate::error::{GlyphsealError, Result};

/// A byte range of the NFC-normalized UTF-8 stream that is removed before
/// hashing. Ranges in an assertion are stored sorted ascending by `start`
/// and must not overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionRange {
    pub start: usize,
    pub length: usize,
}

impl ExclusionRange {
    pub fn new(start: usize, length: usize) -> Self {
        Self { start, length }
    }

    fn end(&self) -> usize {
        self.start + self.length
    }
}

/// Result of [`hash_with_exclusions`].
#[derive(Debug, Clone)]
pub struct NormalizedHash {
    /// NFC-normalized input text.
    pub normalized: String,
    /// SHA-256 over the filtered bytes.
    pub digest: [u8; 32],
    /// Lowercase hex of `digest`.
    pub hex: String,
}

/// NFC-normalize `text`.
pub fn normalize(text: &str) -> String {
    text.nfc().collect()
}

/// Canonicalize whitespace so text reaching the signer from different
/// renderers compares equal. Pre-processing only; hashing itself applies
/// NFC and nothing else.
///
/// Steps: line endings to `\n`, Unicode spaces to ASCII space, horizontal
/// whitespace runs collapsed, every line trimmed, surrounding newlines
/// stripped.
pub fn normalize_whitespace(text: &str) -> String {
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    let text = text
        .replace('\u{00A0}', " ")
        .replace('\u{2009}', " ")
        .replace('\u{200A}', " ");

    let mut collapsed = String::with_capacity(text.len());
    let mut in_run = false;
    for c in text.chars() {
        if c != '\n' && c.is_whitespace() {
            if !in_run {
                collapsed.push(' ');
                in_run = true;
            }
        } else {
            collapsed.push(c);
            in_run = false;
        }
    }

    let trimmed: Vec<&str> = collapsed.split('\n').map(str::trim).collect();
    trimmed.join("\n").trim_matches('\n').to_string()
}

fn validate_exclusions(exclusions: &[ExclusionRange], total_len: usize) -> Result<()> {
    let mut position = 0usize;
    for range in exclusions {
        if range.start < position {
            return Err(GlyphsealError::InvalidExclusion(format!(
                "range at {} overlaps or is out of order (previous end {})",
                range.start, position
            )));
        }
        let end = range
            .start
            .checked_add(range.length)
            .ok_or_else(|| GlyphsealError::InvalidExclusion("range length overflows".into()))?;
        if end > total_len {
            return Err(GlyphsealError::InvalidExclusion(format!(
                "range {}..{} exceeds normalized length {}",
                range.start, end, total_len
            )));
        }
        position = end;
    }
    Ok(())
}

/// Normalize, drop the excluded byte ranges, and hash what remains.
///
/// `exclusions` must already be sorted ascending and non-overlapping;
/// violations fail with [`GlyphsealError::InvalidExclusion`].
pub fn hash_with_exclusions(text: &str, exclusions: &[ExclusionRange]) -> Result<NormalizedHash> {
    let normalized = normalize(text);
    let bytes = normalized.as_bytes();
    validate_exclusions(exclusions, bytes.len())?;

    let mut hasher = Sha256::new();
    let mut position = 0usize;
    for range in exclusions {
        hasher.update(&bytes[position..range.start]);
        position = range.end();
    }
    hasher.update(&bytes[position..]);

    let digest: [u8; 32] = hasher.finalize().into();
    Ok(NormalizedHash {
        hex: hex::encode(digest),
        digest,
        normalized,
    })
}
