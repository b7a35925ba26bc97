//! Byte <-> Unicode variation selector codec.
//!
//! Bytes 0..=15 map onto the variation selectors block (U+FE00..U+FE0F),
//! bytes 16..=255 onto the supplement (U+E0100..U+E01EF). Both blocks are
//! invisible in rendered text, which makes them usable as a data carrier
//! behind any base character.

/// First code point of the VS1-VS16 block.
const VS_BLOCK_START: u32 = 0xFE00;
/// Last code point of the VS1-VS16 block.
const VS_BLOCK_END: u32 = 0xFE0F;
/// First code point of the VS17-VS256 supplement.
const VS_SUPPLEMENT_START: u32 = 0xE0100;
/// Last code point of the VS17-VS256 supplement.
const VS_SUPPLEMENT_END: u32 = 0xE01EF;

/// Map a byte onto its variation selector. Total over `u8`.
pub fn to_selector(byte: u8) -> char {
    let cp = if byte < 16 {
        VS_BLOCK_START + u32::from(byte)
    } else {
        VS_SUPPLEMENT_START + u32::from(byte) - 16
    };
    // Both blocks lie outside the surrogate range.
    char::from_u32(cp).expect("variation selector ranges are valid scalar values")
}

/// Inverse of [`to_selector`]. `None` for any scalar outside the two blocks.
pub fn from_selector(c: char) -> Option<u8> {
    let cp = u32::from(c);
    if (VS_BLOCK_START..=VS_BLOCK_END).contains(&cp) {
        Some((cp - VS_BLOCK_START) as u8)
    } else if (VS_SUPPLEMENT_START..=VS_SUPPLEMENT_END).contains(&cp) {
        Some((cp - VS_SUPPLEMENT_START + 16) as u8)
    } else {
        None
    }
}

/// Whether `c` is a variation selector in either block.
pub fn is_selector(c: char) -> bool {
    from_selector(c).is_some()
}

/// Encode a byte string as a run of variation selectors.
pub fn bytes_to_selectors(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| to_selector(b)).collect()
}

/// The largest contiguous run of variation selectors starting at byte
/// offset `start` of `text`, decoded to bytes, together with the run's
/// length in code points.
pub fn read_selector_run(text: &str, start: usize) -> (Vec<u8>, usize) {
    let mut bytes = Vec::new();
    let mut chars = 0;
    for c in text[start..].chars() {
        match from_selector(c) {
            Some(b) => {
                bytes.push(b);
                chars += 1;
            }
            None => break,
        }
    }
    (bytes, chars)
}

/// Every variation selector in `text`, in order, decoded to bytes.
///
/// Distributed embedding interleaves selectors between base characters, so
/// extraction has to gather the whole text rather than one run.
pub fn collect_selector_bytes(text: &str) -> Vec<u8> {
    text.chars().filter_map(from_selector).collect()
}

/// `text` with every variation selector removed.
pub fn strip_selectors(text: &str) -> String {
    text.chars().filter(|&c| !is_selector(c)).collect()
}

/// Hide `message` behind a single base character (classically an emoji):
/// the base renders, the message rides invisibly after it.
pub fn encode_with_base(base: char, message: &str) -> String {
    let mut out = String::with_capacity(base.len_utf8() + 4 * message.len());
    out.push(base);
    out.push_str(&bytes_to_selectors(message.as_bytes()));
    out
}

/// Recover a message hidden by [`encode_with_base`]. Reads the first
/// selector run in `text`; `None` when no run exists or the bytes are not
/// valid UTF-8.
pub fn decode_from_base(text: &str) -> Option<String> {
    let start = text
        .char_indices()
        .find(|&(_, c)| is_selector(c))
        .map(|(i, _)| i)?;
    let (bytes, _) = read_selector_run(text, start);
    String::from_utf8(bytes).ok()
}
