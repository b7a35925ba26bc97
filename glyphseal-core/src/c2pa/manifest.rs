//! The C2PA manifest model.
//!
//! One manifest carries an ordered assertion list. `c2pa.actions.v1` and
//! `c2pa.soft_binding.v1` are always present in signed output;
//! `c2pa.hash.data.v1` appears iff hard binding is enabled.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::canonical::to_canonical_cbor;
use crate::error::{GlyphsealError, Result};
use crate::hashing::ExclusionRange;

pub const ACTIONS_LABEL: &str = "c2pa.actions.v1";
pub const SOFT_BINDING_LABEL: &str = "c2pa.soft_binding.v1";
pub const HARD_BINDING_LABEL: &str = "c2pa.hash.data.v1";

/// Algorithm identifier recorded in the soft-binding assertion.
pub const SOFT_BINDING_ALGORITHM_ID: &str = "encypher.unicode_variation_selector.v1";

/// One entry of the `c2pa.actions.v1` assertion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub when: Option<String>,
    #[serde(rename = "softwareAgent", skip_serializing_if = "Option::is_none")]
    pub software_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "digitalSourceType", skip_serializing_if = "Option::is_none")]
    pub digital_source_type: Option<String>,
}

impl Action {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    pub fn with_when(mut self, when: impl Into<String>) -> Self {
        self.when = Some(when.into());
        self
    }

    pub fn with_software_agent(mut self, agent: impl Into<String>) -> Self {
        self.software_agent = Some(agent.into());
        self
    }
}

/// A labelled assertion. `data_encoding` is carried for interop payloads
/// whose `data` field round-trips through CBOR + base64.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct C2paAssertion {
    pub label: String,
    pub data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_encoding: Option<String>,
}

impl C2paAssertion {
    pub fn new(label: impl Into<String>, data: Value) -> Self {
        Self {
            label: label.into(),
            data,
            kind: None,
            data_encoding: None,
        }
    }
}

/// The signed manifest payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct C2paManifest {
    #[serde(rename = "@context")]
    pub context: String,
    pub instance_id: String,
    pub claim_generator: String,
    pub assertions: Vec<C2paAssertion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_assertion: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_claims: Option<Map<String, Value>>,
}

impl C2paManifest {
    pub fn assertion(&self, label: &str) -> Option<&C2paAssertion> {
        self.assertions.iter().find(|a| a.label == label)
    }

    fn assertion_mut(&mut self, label: &str) -> Option<&mut C2paAssertion> {
        self.assertions.iter_mut().find(|a| a.label == label)
    }

    /// The typed actions list from the `c2pa.actions.v1` assertion.
    pub fn actions(&self) -> Result<Vec<Action>> {
        let assertion = self.assertion(ACTIONS_LABEL).ok_or_else(|| {
            GlyphsealError::InvalidPayload(format!("manifest missing {ACTIONS_LABEL}"))
        })?;
        let actions = assertion.data.get("actions").ok_or_else(|| {
            GlyphsealError::InvalidPayload("actions assertion missing 'actions' list".into())
        })?;
        serde_json::from_value(actions.clone())
            .map_err(|e| GlyphsealError::InvalidPayload(format!("actions list: {e}")))
    }

    /// The exclusion list recorded in the hard-binding assertion.
    pub fn hard_binding_exclusions(&self) -> Result<Vec<ExclusionRange>> {
        let assertion = self.assertion(HARD_BINDING_LABEL).ok_or_else(|| {
            GlyphsealError::InvalidPayload(format!("manifest missing {HARD_BINDING_LABEL}"))
        })?;
        let exclusions = assertion
            .data
            .get("exclusions")
            .cloned()
            .unwrap_or_else(|| Value::Array(Vec::new()));
        serde_json::from_value(exclusions)
            .map_err(|e| GlyphsealError::InvalidPayload(format!("exclusion list: {e}")))
    }

    /// Insert or replace an assertion, keeping list order stable for
    /// existing labels.
    pub fn set_assertion(&mut self, assertion: C2paAssertion) {
        match self.assertion_mut(&assertion.label) {
            Some(existing) => *existing = assertion,
            None => self.assertions.push(assertion),
        }
    }

    /// Canonical CBOR bytes of the manifest, the exact COSE payload.
    pub fn to_cbor(&self) -> Result<Vec<u8>> {
        to_canonical_cbor(self)
    }

    /// Parse a manifest back out of COSE payload bytes.
    pub fn from_cbor(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes)
            .map_err(|e| GlyphsealError::MalformedEnvelope(format!("manifest CBOR: {e}")))
    }
}

/// Caller-supplied fields for a C2PA embed. Everything is optional; the
/// assembler derives defaults for whatever is absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct C2paFields {
    pub claim_generator: Option<String>,
    pub actions: Vec<Action>,
    pub ai_assertion: Option<Map<String, Value>>,
    pub custom_claims: Option<Map<String, Value>>,
    /// Normalized into the defaulted `c2pa.created` action's `when`.
    pub timestamp: Option<String>,
    /// Supply to make embedding deterministic; a fresh v4 UUID otherwise.
    pub instance_id: Option<String>,
}

/// Build the `c2pa.actions.v1` assertion from a typed actions list.
pub fn actions_assertion(actions: &[Action]) -> Result<C2paAssertion> {
    let list = serde_json::to_value(actions)
        .map_err(|e| GlyphsealError::InvalidPayload(format!("actions: {e}")))?;
    Ok(C2paAssertion::new(
        ACTIONS_LABEL,
        serde_json::json!({ "actions": list }),
    ))
}

/// Build the soft-binding assertion for an already-computed digest.
pub fn soft_binding_assertion(hash_hex: &str) -> C2paAssertion {
    C2paAssertion::new(
        SOFT_BINDING_LABEL,
        serde_json::json!({
            "alg": "sha256",
            "hash": hash_hex,
            "algorithm_id": SOFT_BINDING_ALGORITHM_ID,
        }),
    )
}

/// Build the hard-binding assertion.
pub fn hard_binding_assertion(hash_hex: &str, exclusions: &[ExclusionRange]) -> C2paAssertion {
    C2paAssertion::new(
        HARD_BINDING_LABEL,
        serde_json::json!({
            "alg": "sha256",
            "hash": hash_hex,
            "exclusions": exclusions,
        }),
    )
}
