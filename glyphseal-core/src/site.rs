//! Site selection for the legacy embedding formats.
//!
//! C2PA output always appends the wrapper; the legacy envelope instead
//! lands after a target character chosen by policy. Placement is a pure
//! function of the text and the target, so re-embedding the same bytes
//! into the same input is byte-identical.

use crate::error::{GlyphsealError, Result};
use crate::selector::bytes_to_selectors;

/// Where the selector block may be inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MetadataTarget {
    #[default]
    Whitespace,
    Punctuation,
    FirstLetter,
    LastLetter,
    AllCharacters,
    EndOfText,
    /// End of text with a U+FEFF sentinel before the block.
    EndOfTextFeff,
}

impl MetadataTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Whitespace => "whitespace",
            Self::Punctuation => "punctuation",
            Self::FirstLetter => "first_letter",
            Self::LastLetter => "last_letter",
            Self::AllCharacters => "all_characters",
            Self::EndOfText => "end_of_text",
            Self::EndOfTextFeff => "end_of_text_feff",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "whitespace" => Some(Self::Whitespace),
            "punctuation" => Some(Self::Punctuation),
            "first_letter" => Some(Self::FirstLetter),
            "last_letter" => Some(Self::LastLetter),
            "all_characters" => Some(Self::AllCharacters),
            "end_of_text" => Some(Self::EndOfText),
            "end_of_text_feff" => Some(Self::EndOfTextFeff),
            _ => None,
        }
    }

    fn is_end_of_text(&self) -> bool {
        matches!(self, Self::EndOfText | Self::EndOfTextFeff)
    }
}

impl std::fmt::Display for MetadataTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn is_target_punctuation(c: char) -> bool {
    matches!(c, '.' | ',' | '!' | '?' | ';' | ':')
}

/// Byte indices of the characters after which selectors may be inserted.
/// End-of-text targets have no character sites and return an empty list.
pub fn find_targets(text: &str, target: MetadataTarget) -> Vec<usize> {
    if target.is_end_of_text() {
        return Vec::new();
    }
    let mut sites = Vec::new();
    let mut prev_is_word = false;
    let mut iter = text.char_indices().peekable();
    while let Some((index, c)) = iter.next() {
        let matched = match target {
            MetadataTarget::Whitespace => c.is_whitespace(),
            MetadataTarget::Punctuation => is_target_punctuation(c),
            MetadataTarget::FirstLetter => is_word_char(c) && !prev_is_word,
            MetadataTarget::LastLetter => {
                is_word_char(c)
                    && !iter.peek().map(|&(_, next)| is_word_char(next)).unwrap_or(false)
            }
            MetadataTarget::AllCharacters => true,
            MetadataTarget::EndOfText | MetadataTarget::EndOfTextFeff => false,
        };
        if matched {
            sites.push(index);
        }
        prev_is_word = is_word_char(c);
    }
    sites
}

/// Whether `text` offers at least one insertion site for `target`.
pub fn has_viable_site(text: &str, target: MetadataTarget) -> bool {
    target.is_end_of_text() || !find_targets(text, target).is_empty()
}

fn insert_after_char(text: &str, site: usize, block: &str) -> String {
    let site_char_end = site
        + text[site..]
            .chars()
            .next()
            .map(char::len_utf8)
            .unwrap_or(0);
    let mut out = String::with_capacity(text.len() + block.len());
    out.push_str(&text[..site_char_end]);
    out.push_str(block);
    out.push_str(&text[site_char_end..]);
    out
}

/// Place all of `payload` immediately after the first matching site.
pub fn embed_single_site(text: &str, target: MetadataTarget, payload: &[u8]) -> Result<String> {
    let block = bytes_to_selectors(payload);
    match target {
        MetadataTarget::EndOfText => Ok(format!("{text}{block}")),
        MetadataTarget::EndOfTextFeff => Ok(format!("{text}\u{FEFF}{block}")),
        _ => {
            let sites = find_targets(text, target);
            match sites.first() {
                Some(&site) => Ok(insert_after_char(text, site, &block)),
                None => Err(GlyphsealError::NoViableSite {
                    target: target.as_str().to_string(),
                    needed: 1,
                    available: 0,
                }),
            }
        }
    }
}

/// Interleave `payload` across matching sites in order, `fanout` selectors
/// per site. Requires `ceil(len / fanout)` sites.
pub fn embed_distributed(
    text: &str,
    target: MetadataTarget,
    payload: &[u8],
    fanout: usize,
) -> Result<String> {
    if fanout == 0 {
        return Err(GlyphsealError::InvalidInput(
            "distribution fanout must be positive".into(),
        ));
    }
    if target.is_end_of_text() {
        return embed_single_site(text, target, payload);
    }

    let sites = find_targets(text, target);
    let needed = payload.len().div_ceil(fanout);
    if sites.len() < needed {
        return Err(GlyphsealError::NoViableSite {
            target: target.as_str().to_string(),
            needed,
            available: sites.len(),
        });
    }

    let mut out = String::with_capacity(text.len() + 4 * payload.len());
    let mut chunks = payload.chunks(fanout);
    let mut next_site = sites.iter().copied().peekable();
    for (index, c) in text.char_indices() {
        out.push(c);
        if next_site.peek() == Some(&index) {
            next_site.next();
            if let Some(chunk) = chunks.next() {
                out.push_str(&bytes_to_selectors(chunk));
            }
        }
    }
    Ok(out)
}
