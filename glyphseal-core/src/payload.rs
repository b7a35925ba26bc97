//! Payload models shared by the embedding formats.
//!
//! The original line of tools dispatched on format strings; here the format
//! is a sum type and each variant owns its serializer and signing-input
//! rules. `basic` and the two legacy manifest modes ride the signed
//! envelope; `c2pa` rides the COSE/JUMBF wrapper pipeline.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::c2pa::{C2paFields, C2paManifest};
use crate::error::{GlyphsealError, Result};

/// Wire tag of each payload format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataFormat {
    Basic,
    ManifestJson,
    ManifestCbor,
    C2pa,
}

impl MetadataFormat {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::ManifestJson => "manifest-json",
            Self::ManifestCbor => "manifest-cbor",
            Self::C2pa => "c2pa",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "basic" => Some(Self::Basic),
            "manifest-json" => Some(Self::ManifestJson),
            "manifest-cbor" => Some(Self::ManifestCbor),
            "c2pa" => Some(Self::C2pa),
            _ => None,
        }
    }
}

impl std::fmt::Display for MetadataFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// A caller-supplied timestamp: epoch seconds or an ISO 8601 string.
/// Normalized to `YYYY-MM-DDTHH:MM:SSZ` before signing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Timestamp {
    Epoch(i64),
    Iso(String),
}

impl Timestamp {
    /// Normalize to an ISO 8601 UTC string with second precision.
    pub fn to_iso_utc(&self) -> Result<String> {
        let utc: DateTime<Utc> = match self {
            Timestamp::Epoch(secs) => DateTime::from_timestamp(*secs, 0).ok_or_else(|| {
                GlyphsealError::InvalidInput(format!("invalid epoch timestamp: {secs}"))
            })?,
            Timestamp::Iso(s) => parse_iso(s)?,
        };
        Ok(utc.format("%Y-%m-%dT%H:%M:%SZ").to_string())
    }

    /// The normalized form, ready for a payload field.
    pub fn normalized(&self) -> Result<Timestamp> {
        Ok(Timestamp::Iso(self.to_iso_utc()?))
    }
}

impl From<i64> for Timestamp {
    fn from(secs: i64) -> Self {
        Timestamp::Epoch(secs)
    }
}

impl From<&str> for Timestamp {
    fn from(s: &str) -> Self {
        Timestamp::Iso(s.to_string())
    }
}

fn parse_iso(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(naive.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(naive.and_utc());
        }
    }
    Err(GlyphsealError::InvalidInput(format!(
        "invalid timestamp string: {s}"
    )))
}

/// Flat key/value payload, the lightest of the carriers. Every field is
/// optional; absent means absent, never an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BasicPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub custom_metadata: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// One assertion of a legacy manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyAssertion {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub when: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub data: Map<String, Value>,
}

/// The pre-C2PA manifest carrier, serialized as canonical JSON or canonical
/// CBOR depending on the chosen format variant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegacyManifest {
    #[serde(default)]
    pub claim_generator: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assertions: Vec<LegacyAssertion>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub ai_assertion: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub custom_claims: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// What to embed, by format variant.
#[derive(Debug, Clone, PartialEq)]
pub enum PayloadSpec {
    Basic(BasicPayload),
    ManifestJson(LegacyManifest),
    ManifestCbor(LegacyManifest),
    C2pa(C2paFields),
}

impl PayloadSpec {
    pub fn format(&self) -> MetadataFormat {
        match self {
            Self::Basic(_) => MetadataFormat::Basic,
            Self::ManifestJson(_) => MetadataFormat::ManifestJson,
            Self::ManifestCbor(_) => MetadataFormat::ManifestCbor,
            Self::C2pa(_) => MetadataFormat::C2pa,
        }
    }
}

/// Typed read-side view of an extracted payload.
#[derive(Debug, Clone, PartialEq)]
pub enum PayloadView {
    Basic(BasicPayload),
    Manifest(LegacyManifest),
    C2pa(C2paManifest),
}

impl PayloadView {
    pub fn as_basic(&self) -> Option<&BasicPayload> {
        match self {
            Self::Basic(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_manifest(&self) -> Option<&LegacyManifest> {
        match self {
            Self::Manifest(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_c2pa(&self) -> Option<&C2paManifest> {
        match self {
            Self::C2pa(m) => Some(m),
            _ => None,
        }
    }
}

/// Recursively drop every occurrence of the named keys from a JSON value.
/// Used to strip caller-designated fields from Basic payloads before
/// signing.
pub fn omit_keys(value: &mut Value, keys: &[String]) {
    match value {
        Value::Object(map) => {
            map.retain(|k, _| !keys.iter().any(|key| key == k));
            for (_, v) in map.iter_mut() {
                omit_keys(v, keys);
            }
        }
        Value::Array(items) => {
            for item in items {
                omit_keys(item, keys);
            }
        }
        _ => {}
    }
}
