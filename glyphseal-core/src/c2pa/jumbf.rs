//! Minimal JUMBF container for the manifest store.
//!
//! One superbox holds a description box and a single CBOR content box with
//! the COSE_Sign1 bytes:
//!
//! ```text
//! [u32 size]["jumb"]
//!   [u32 size]["jumd"][16-byte type UUID][toggles][label][0x00]
//!   [u32 size]["cbor"][COSE_Sign1 bytes]
//! ```

use crate::error::{GlyphsealError, Result};

const SUPERBOX_TYPE: &[u8; 4] = b"jumb";
const DESCRIPTION_TYPE: &[u8; 4] = b"jumd";
const CBOR_CONTENT_TYPE: &[u8; 4] = b"cbor";

/// C2PA manifest-store content type UUID (`c2pa` + ISO variant suffix).
const MANIFEST_STORE_UUID: [u8; 16] = [
    0x63, 0x32, 0x70, 0x61, 0x00, 0x11, 0x00, 0x10, 0x80, 0x00, 0x00, 0xAA, 0x00, 0x38, 0x9B,
    0x71,
];

const MANIFEST_STORE_LABEL: &[u8] = b"c2pa";

/// Requestable box with label present.
const TOGGLES: u8 = 0x03;

fn push_box(out: &mut Vec<u8>, box_type: &[u8; 4], body: &[u8]) {
    let size = 8 + body.len();
    out.extend_from_slice(&(size as u32).to_be_bytes());
    out.extend_from_slice(box_type);
    out.extend_from_slice(body);
}

/// Package COSE_Sign1 bytes into a manifest store.
pub fn pack(cose_bytes: &[u8]) -> Vec<u8> {
    let mut description = Vec::with_capacity(16 + 1 + MANIFEST_STORE_LABEL.len() + 1);
    description.extend_from_slice(&MANIFEST_STORE_UUID);
    description.push(TOGGLES);
    description.extend_from_slice(MANIFEST_STORE_LABEL);
    description.push(0x00);

    let mut contents = Vec::new();
    push_box(&mut contents, DESCRIPTION_TYPE, &description);
    push_box(&mut contents, CBOR_CONTENT_TYPE, cose_bytes);

    let mut out = Vec::with_capacity(8 + contents.len());
    push_box(&mut out, SUPERBOX_TYPE, &contents);
    out
}

fn read_box<'a>(bytes: &'a [u8], expected_type: &[u8; 4]) -> Result<(&'a [u8], &'a [u8])> {
    if bytes.len() < 8 {
        return Err(GlyphsealError::MalformedEnvelope(
            "JUMBF box shorter than its header".into(),
        ));
    }
    let size = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
    if size < 8 || size > bytes.len() {
        return Err(GlyphsealError::MalformedEnvelope(format!(
            "JUMBF box size {size} out of bounds"
        )));
    }
    if &bytes[4..8] != expected_type {
        return Err(GlyphsealError::MalformedEnvelope(format!(
            "expected JUMBF box '{}', found '{}'",
            String::from_utf8_lossy(expected_type),
            String::from_utf8_lossy(&bytes[4..8]),
        )));
    }
    Ok((&bytes[8..size], &bytes[size..]))
}

/// Unpack a manifest store back to the COSE_Sign1 bytes.
pub fn unpack(store: &[u8]) -> Result<Vec<u8>> {
    let (superbox, rest) = read_box(store, SUPERBOX_TYPE)?;
    if !rest.is_empty() {
        return Err(GlyphsealError::MalformedEnvelope(
            "trailing bytes after JUMBF superbox".into(),
        ));
    }

    let (description, contents) = read_box(superbox, DESCRIPTION_TYPE)?;
    if description.len() < 17 {
        return Err(GlyphsealError::MalformedEnvelope(
            "JUMBF description box too short".into(),
        ));
    }
    if description[..16] != MANIFEST_STORE_UUID {
        return Err(GlyphsealError::MalformedEnvelope(
            "JUMBF description box carries an unknown content type".into(),
        ));
    }

    let (cose, rest) = read_box(contents, CBOR_CONTENT_TYPE)?;
    if !rest.is_empty() {
        return Err(GlyphsealError::MalformedEnvelope(
            "trailing bytes after JUMBF content box".into(),
        ));
    }
    Ok(cose.to_vec())
}
