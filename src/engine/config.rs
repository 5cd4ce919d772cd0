//! Engine configuration

use serde::{Deserialize, Serialize};

/// Recognized configuration options
///
/// ```ignore
/// let config = EngineConfig::new()
///     .with_cache_ttl_ms(60_000)
///     .with_max_audit_entries(5_000);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Master kill-switch; a disabled engine prompts for everything
    pub enabled: bool,

    /// Profile id used when no profile is active
    pub default_profile: Option<String>,

    /// Whether evaluations are written to the audit log
    pub audit_enabled: bool,

    /// Ring-buffer cap for the audit log
    pub max_audit_entries: usize,

    /// Whether cacheable decisions are memoized
    pub cache_enabled: bool,

    /// Default decision cache lifetime in milliseconds
    pub cache_ttl_ms: u64,

    /// Period of the background cache sweep in milliseconds
    pub cache_sweep_interval_ms: u64,
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_default_profile(mut self, profile_id: impl Into<String>) -> Self {
        self.default_profile = Some(profile_id.into());
        self
    }

    pub fn with_audit_enabled(mut self, audit_enabled: bool) -> Self {
        self.audit_enabled = audit_enabled;
        self
    }

    pub fn with_max_audit_entries(mut self, max_audit_entries: usize) -> Self {
        self.max_audit_entries = max_audit_entries;
        self
    }

    pub fn with_cache_enabled(mut self, cache_enabled: bool) -> Self {
        self.cache_enabled = cache_enabled;
        self
    }

    pub fn with_cache_ttl_ms(mut self, cache_ttl_ms: u64) -> Self {
        self.cache_ttl_ms = cache_ttl_ms;
        self
    }

    pub fn with_cache_sweep_interval_ms(mut self, interval_ms: u64) -> Self {
        self.cache_sweep_interval_ms = interval_ms;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_profile: None,
            audit_enabled: true,
            max_audit_entries: 1000,
            cache_enabled: true,
            cache_ttl_ms: 5 * 60 * 1000,
            cache_sweep_interval_ms: 60 * 1000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = EngineConfig::default();
        assert!(config.enabled);
        assert!(config.audit_enabled);
        assert!(config.cache_enabled);
        assert_eq!(config.max_audit_entries, 1000);
        assert_eq!(config.cache_ttl_ms, 300_000);
    }

    #[test]
    fn test_config_builder() {
        let config = EngineConfig::new()
            .with_enabled(false)
            .with_default_profile("fallback")
            .with_cache_ttl_ms(1000);

        assert!(!config.enabled);
        assert_eq!(config.default_profile.as_deref(), Some("fallback"));
        assert_eq!(config.cache_ttl_ms, 1000);
    }

    #[test]
    fn test_config_serde_fills_missing_fields() {
        let config: EngineConfig = serde_json::from_str("{\"enabled\": false}").unwrap();
        assert!(!config.enabled);
        assert_eq!(config.max_audit_entries, 1000);
    }
}
