//! Engine configuration.
//!
//! The core never reads process-global state on its own; every public entry
//! point takes an [`EngineConfig`] (usually inside its options struct).
//! [`EngineConfig::from_env`] is offered as a convenience for callers that
//! want the historical environment-variable surface.

/// Canonical C2PA context URL, v2.2 schema.
pub const CONTEXT_URL_V2_2: &str = "https://c2pa.org/schemas/v2.2/c2pa.jsonld";

/// Canonical C2PA context URL, v2.3 schema.
pub const CONTEXT_URL_V2_3: &str = "https://c2pa.org/schemas/v2.3/c2pa.jsonld";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Overrides the `@context` URL emitted at signing time.
    pub context_url: Option<String>,
    /// Allowlist consulted by the verifier. The emitted `context_url`, when
    /// set, is always accepted in addition to this list.
    pub accepted_contexts: Vec<String>,
    /// Default for `add_hard_binding` when the caller leaves it unset.
    /// Streaming sessions force this off.
    pub hard_binding_default: bool,
    /// Selectors placed per site in distributed embedding mode.
    pub distribution_fanout: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            context_url: None,
            accepted_contexts: vec![CONTEXT_URL_V2_2.to_string(), CONTEXT_URL_V2_3.to_string()],
            hard_binding_default: true,
            distribution_fanout: 1,
        }
    }
}

impl EngineConfig {
    /// Build a configuration from the recognized environment variables,
    /// falling back to defaults for anything unset or unparsable:
    /// `C2PA_CONTEXT_URL`, `C2PA_ACCEPTED_CONTEXTS` (comma separated),
    /// `HARD_BINDING_DEFAULT`, `DISTRIBUTION_FANOUT`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("C2PA_CONTEXT_URL") {
            if !url.is_empty() {
                config.context_url = Some(url);
            }
        }
        if let Ok(list) = std::env::var("C2PA_ACCEPTED_CONTEXTS") {
            let contexts: Vec<String> = list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            if !contexts.is_empty() {
                config.accepted_contexts = contexts;
            }
        }
        if let Ok(flag) = std::env::var("HARD_BINDING_DEFAULT") {
            match flag.trim() {
                "1" | "true" | "TRUE" | "True" => config.hard_binding_default = true,
                "0" | "false" | "FALSE" | "False" => config.hard_binding_default = false,
                _ => {}
            }
        }
        if let Ok(fanout) = std::env::var("DISTRIBUTION_FANOUT") {
            if let Ok(n) = fanout.trim().parse::<usize>() {
                if n > 0 {
                    config.distribution_fanout = n;
                }
            }
        }
        config
    }

    /// The `@context` URL written into new manifests.
    pub fn emitted_context(&self) -> &str {
        self.context_url.as_deref().unwrap_or(CONTEXT_URL_V2_2)
    }

    /// Whether the verifier accepts a manifest carrying `url`.
    pub fn accepts_context(&self, url: &str) -> bool {
        self.context_url.as_deref() == Some(url)
            || self.accepted_contexts.iter().any(|c| c == url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_accepts_both_canonical_contexts() {
        let config = EngineConfig::default();
        assert!(config.accepts_context(CONTEXT_URL_V2_2));
        assert!(config.accepts_context(CONTEXT_URL_V2_3));
        assert!(!config.accepts_context("https://example.com/other.jsonld"));
    }

    #[test]
    fn custom_context_url_is_emitted_and_accepted() {
        let config = EngineConfig {
            context_url: Some("https://example.com/c2pa.jsonld".into()),
            ..EngineConfig::default()
        };
        assert_eq!(config.emitted_context(), "https://example.com/c2pa.jsonld");
        assert!(config.accepts_context("https://example.com/c2pa.jsonld"));
        assert!(config.accepts_context(CONTEXT_URL_V2_2));
    }
}
