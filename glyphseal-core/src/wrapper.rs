//! The end-of-text manifest wrapper.
//!
//! Wire layout (before selector encoding):
//!
//! ```text
//! [8 bytes] magic "C2PATXT\0"
//! [1 byte ] version (currently 1)
//! [4 bytes] manifest length, big endian
//! [N bytes] JUMBF-packaged manifest store
//! ```
//!
//! The whole byte string is encoded through the selector codec and prefixed
//! with a single U+FEFF sentinel. Exactly one wrapper is allowed per text.

use tracing::debug;

use crate::error::{GlyphsealError, Result, CURRENT_WRAPPER_VERSION, MAX_MANIFEST_SIZE};
use crate::selector::{bytes_to_selectors, read_selector_run, to_selector};

/// 8-byte magic opening the wrapper header.
pub const MAGIC: [u8; 8] = *b"C2PATXT\0";

/// Header length in logical bytes: magic + version + u32 manifest length.
pub const HEADER_LEN: usize = 13;

/// Sentinel scalar immediately preceding the selector run.
pub const SENTINEL: char = '\u{FEFF}';

/// A wrapper located and decoded inside a text.
#[derive(Debug, Clone)]
pub struct DecodedWrapper {
    /// The JUMBF manifest store carried by the wrapper.
    pub manifest_bytes: Vec<u8>,
    /// The input with the wrapper removed.
    pub clean_text: String,
    /// Code-point span `(start, end)` of the wrapper, sentinel included.
    pub span: (usize, usize),
}

fn header_bytes(manifest_len: usize) -> [u8; HEADER_LEN] {
    let mut header = [0u8; HEADER_LEN];
    header[..8].copy_from_slice(&MAGIC);
    header[8] = CURRENT_WRAPPER_VERSION;
    header[9..].copy_from_slice(&(manifest_len as u32).to_be_bytes());
    header
}

/// Encode `manifest_bytes` into the invisible wrapper text.
pub fn encode_wrapper(manifest_bytes: &[u8]) -> Result<String> {
    if manifest_bytes.len() as u64 > MAX_MANIFEST_SIZE {
        return Err(GlyphsealError::InvalidInput(format!(
            "manifest store of {} bytes exceeds the wrapper length field",
            manifest_bytes.len()
        )));
    }
    let header = header_bytes(manifest_bytes.len());
    let mut out = String::with_capacity(4 * (HEADER_LEN + manifest_bytes.len()) + 3);
    out.push(SENTINEL);
    out.push_str(&bytes_to_selectors(&header));
    out.push_str(&bytes_to_selectors(manifest_bytes));
    Ok(out)
}

/// Exact UTF-8 byte length of the wrapper text that would carry
/// `manifest_bytes`: 3 bytes for the sentinel, 3 per selector in the VS
/// block, 4 per selector in the supplement.
///
/// The hard-binding exclusion records this quantity, so it must agree with
/// [`encode_wrapper`] byte for byte.
pub fn wrapper_utf8_len(manifest_bytes: &[u8]) -> usize {
    let header = header_bytes(manifest_bytes.len());
    let selector_len = |b: &u8| to_selector(*b).len_utf8();
    3 + header.iter().map(selector_len).sum::<usize>()
        + manifest_bytes.iter().map(selector_len).sum::<usize>()
}

struct Candidate {
    /// Code-point index of the sentinel.
    cp_start: usize,
    /// Byte index of the sentinel.
    byte_start: usize,
    /// Byte index just past the selector run.
    byte_end: usize,
    /// Run length in code points.
    run_chars: usize,
    bytes: Vec<u8>,
}

fn find_candidates(text: &str) -> Vec<Candidate> {
    let mut candidates = Vec::new();
    let mut cp_index = 0usize;
    let mut iter = text.char_indices().peekable();
    while let Some((byte_index, c)) = iter.next() {
        if c == SENTINEL {
            let run_start = byte_index + c.len_utf8();
            let (bytes, run_chars) = read_selector_run(text, run_start);
            if run_chars >= HEADER_LEN {
                let run_bytes: usize = text[run_start..]
                    .chars()
                    .take(run_chars)
                    .map(char::len_utf8)
                    .sum();
                candidates.push(Candidate {
                    cp_start: cp_index,
                    byte_start: byte_index,
                    byte_end: run_start + run_bytes,
                    run_chars,
                    bytes,
                });
                // Skip past the run so a sentinel inside it is not re-scanned.
                while let Some(&(idx, _)) = iter.peek() {
                    if idx < run_start + run_bytes {
                        iter.next();
                        cp_index += 1;
                    } else {
                        break;
                    }
                }
            }
        }
        cp_index += 1;
    }
    candidates
}

/// Strict header validation of a candidate run. Returns the manifest bytes
/// when magic, version, and length all hold.
fn decode_candidate(bytes: &[u8], run_chars: usize) -> Result<Vec<u8>> {
    if bytes[..8] != MAGIC {
        return Err(GlyphsealError::CorruptedWrapper("magic mismatch".into()));
    }
    if bytes[8] != CURRENT_WRAPPER_VERSION {
        return Err(GlyphsealError::CorruptedWrapper(format!(
            "unsupported wrapper version {}",
            bytes[8]
        )));
    }
    let manifest_len =
        u32::from_be_bytes([bytes[9], bytes[10], bytes[11], bytes[12]]) as usize;
    if run_chars != HEADER_LEN + manifest_len {
        return Err(GlyphsealError::CorruptedWrapper(format!(
            "selector run of {} does not match declared manifest length {}",
            run_chars, manifest_len
        )));
    }
    Ok(bytes[HEADER_LEN..].to_vec())
}

/// Locate and decode the wrapper in `text`.
///
/// Returns `Ok(None)` when no sentinel-prefixed selector run is present, or
/// when the only runs found do not open with the wrapper magic (stray FEFF
/// blocks belonging to legacy payloads fall here). Two or more decodable
/// wrappers are rejected with [`GlyphsealError::MultipleWrappers`]; a single
/// run that carries the magic but breaks the version or length invariant is
/// [`GlyphsealError::CorruptedWrapper`].
pub fn find_and_decode(text: &str) -> Result<Option<DecodedWrapper>> {
    let candidates = find_candidates(text);
    if candidates.is_empty() {
        return Ok(None);
    }
    debug!(candidates = candidates.len(), "scanned sentinel-prefixed selector runs");

    let mut decoded: Vec<(usize, Vec<u8>)> = Vec::new();
    let mut corrupted: Option<GlyphsealError> = None;
    for (i, candidate) in candidates.iter().enumerate() {
        match decode_candidate(&candidate.bytes, candidate.run_chars) {
            Ok(manifest) => decoded.push((i, manifest)),
            Err(e @ GlyphsealError::CorruptedWrapper(_)) => {
                if candidate.bytes[..8] == MAGIC {
                    corrupted = Some(e);
                }
            }
            Err(e) => return Err(e),
        }
    }

    if decoded.len() > 1 {
        return Err(GlyphsealError::MultipleWrappers);
    }
    let (index, manifest_bytes) = match decoded.pop() {
        Some(found) => found,
        None => {
            return match corrupted {
                Some(e) => Err(e),
                None => Ok(None),
            }
        }
    };

    let candidate = &candidates[index];
    let mut clean_text = String::with_capacity(text.len());
    clean_text.push_str(&text[..candidate.byte_start]);
    clean_text.push_str(&text[candidate.byte_end..]);

    Ok(Some(DecodedWrapper {
        manifest_bytes,
        clean_text,
        span: (candidate.cp_start, candidate.cp_start + 1 + candidate.run_chars),
    }))
}
