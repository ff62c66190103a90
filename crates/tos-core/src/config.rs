use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the agreement gate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GateConfig {
    /// Path of the acceptance page. Requests to it are never gated.
    pub acceptance_path: String,
    /// Query parameter carrying the original path through the redirect.
    pub redirect_field: String,
    /// Header marking asynchronous sub-requests.
    pub ajax_header: String,
    /// Where to send users after acceptance when `next` is unusable.
    pub fallback_redirect: String,
    /// Recover from a missing active document with a warning instead of an
    /// error. Meant for development and test deployments.
    pub debug: bool,
    /// Lifetime of derived cache entries. `0` keeps them until evicted.
    pub cache_ttl_secs: u64,
    /// Namespace for every cache key this gate writes.
    pub key_prefix: String,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            acceptance_path: "/tos/check/".to_string(),
            redirect_field: "next".to_string(),
            ajax_header: "x-requested-with".to_string(),
            fallback_redirect: "/".to_string(),
            debug: false,
            cache_ttl_secs: 300,
            key_prefix: "tos".to_string(),
        }
    }
}

impl GateConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_acceptance_path(mut self, path: impl Into<String>) -> Self {
        self.acceptance_path = path.into();
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn cache_ttl(&self) -> Option<Duration> {
        (self.cache_ttl_secs > 0).then(|| Duration::from_secs(self.cache_ttl_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: GateConfig = serde_json::from_str(r#"{"debug": true}"#).unwrap();
        assert!(config.debug);
        assert_eq!(config.acceptance_path, "/tos/check/");
        assert_eq!(config.cache_ttl(), Some(Duration::from_secs(300)));
    }

    #[test]
    fn test_zero_ttl_disables_expiry() {
        let config = GateConfig {
            cache_ttl_secs: 0,
            ..GateConfig::default()
        };
        assert_eq!(config.cache_ttl(), None);
    }
}
