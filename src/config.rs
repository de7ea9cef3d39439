//! Aggregate configuration: one TOML-backed struct nesting each
//! component's own config type, loaded the way the teacher's `Config`
//! loads — `toml::from_str` over a file read wrapped in `anyhow::Context`.
//!
//! There is deliberately no CLI surface here (see the Non-goals): this
//! crate is a library, and callers own how `SentinelConfig` gets built —
//! from a file, from environment-driven overrides, or from defaults.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::classification::{CircuitBreakerConfig, ClassificationCacheConfig};
use crate::regex_cache::RegexCacheConfig;
use crate::retry::{ErrorClassifier, RetryPolicy};
use crate::template::TemplateEngineConfig;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SentinelConfig {
    pub regex_cache: RegexCacheConfig,
    pub classification_cache: ClassificationCacheConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub retry: RetryConfig,
    pub template_engine: TemplateEngineConfig,
}

impl SentinelConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: SentinelConfig = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        Ok(config)
    }
}

/// Serializable mirror of [`RetryPolicy`]'s tunables. `RetryPolicy` itself
/// carries a boxed classifier trait object that cannot derive
/// `Deserialize`, so configuration round-trips through this plain struct
/// and callers pick the classifier when turning it into a `RetryPolicy`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let defaults = RetryPolicy::llm_classification_default();
        Self {
            max_retries: defaults.max_retries,
            base_delay: defaults.base_delay,
            max_delay: defaults.max_delay,
            multiplier: defaults.multiplier,
            jitter: defaults.jitter,
        }
    }
}

impl RetryConfig {
    /// Combine the loaded tunables with a caller-supplied classifier to
    /// produce a [`RetryPolicy`] ready for [`crate::retry::RetryExecutor`].
    /// The classifier is not itself configuration-file material since
    /// `Box<dyn ErrorClassifier>` cannot derive `Deserialize`.
    pub fn into_policy(self, classifier: Box<dyn ErrorClassifier>, op_name: Option<String>) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: self.base_delay,
            max_delay: self.max_delay,
            multiplier: self.multiplier,
            jitter: self.jitter,
            classifier,
            op_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_values() {
        let config = SentinelConfig::default();
        assert_eq!(config.regex_cache.max_size, 500);
        assert_eq!(config.classification_cache.max_size, 10_000);
        assert_eq!(config.circuit_breaker.failure_threshold, 5);
    }

    #[test]
    fn from_file_parses_partial_toml_with_defaults_missing() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("sentinel-config-test-{:?}.toml", std::thread::current().id()));
        std::fs::write(
            &path,
            r#"
            [regex_cache]
            max_size = 50

            [classification_cache]
            ttl = { secs = 60, nanos = 0 }
            max_size = 5

            [circuit_breaker]
            failure_threshold = 2
            reset_timeout = { secs = 5, nanos = 0 }

            [retry]
            max_retries = 2
            base_delay = { secs = 0, nanos = 100000000 }
            max_delay = { secs = 1, nanos = 0 }
            multiplier = 2.0
            jitter = true

            [template_engine]
            cache_capacity = 128
            render_timeout = { secs = 2, nanos = 0 }
            "#,
        )
        .unwrap();

        let config = SentinelConfig::from_file(&path).unwrap();
        assert_eq!(config.regex_cache.max_size, 50);
        assert_eq!(config.circuit_breaker.failure_threshold, 2);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn retry_config_converts_into_a_policy_with_the_given_classifier() {
        use crate::retry::DefaultClassifier;

        let retry_config = RetryConfig::default();
        let policy = retry_config.into_policy(Box::new(DefaultClassifier), Some("test_op".to_string()));
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.op_name.as_deref(), Some("test_op"));
    }
}
