//! Cache-first → retry+circuit-breaker → rule-based-fallback classification
//! pipeline. Never fails visibly: every alert gets a [`Classification`],
//! whether LLM-derived or produced by the deterministic fallback.
//!
//! Fallback shape grounded on the teacher's
//! `output::ai::enricher::BasicEnhancementEngine::classify_finding`: a
//! keyword-pattern table scored against the alert's text, generalized here
//! to alertname-prefix + severity-label inspection since alerts carry
//! structured labels rather than free-text findings.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::model::Alert;
use crate::retry::{RetryExecutor, RetryObserver, RetryPolicy};

use super::breaker::CircuitBreaker;
use super::cache::ClassificationCache;
use super::types::{Classification, Severity};

/// Egress seam: the opaque LLM call. The wire protocol is out of scope;
/// implementations adapt whatever HTTP/gRPC client they use to this trait.
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    async fn classify(&self, alert: &Alert) -> anyhow::Result<Classification>;
}

/// Alertname prefixes consulted by the rule-based fallback, most specific
/// first. The exact table is an Open Question left to implementers by the
/// source material; this one is documented and stable so tests can assert
/// against it (see DESIGN.md).
const FALLBACK_PREFIX_TABLE: &[(&str, Severity)] = &[
    ("OOM", Severity::Critical),
    ("Crash", Severity::Critical),
    ("Down", Severity::Critical),
    ("Latency", Severity::Warning),
    ("Slow", Severity::Warning),
    ("Degraded", Severity::Warning),
];

const FALLBACK_CONFIDENCE: f64 = 0.35;
const FALLBACK_MODEL: &str = "rule-based-fallback";

/// Deterministic fallback classification derived from label inspection.
/// Never cached: `is_fallback` is always `true`.
pub fn rule_based_fallback(alert: &Alert) -> Classification {
    let started = Instant::now();

    let severity = alert
        .label("severity")
        .and_then(parse_severity_label)
        .unwrap_or_else(|| {
            let alertname = alert.label("alertname").unwrap_or("");
            FALLBACK_PREFIX_TABLE
                .iter()
                .find(|(prefix, _)| alertname.contains(prefix))
                .map(|(_, sev)| *sev)
                .unwrap_or(Severity::Info)
        });

    Classification {
        severity,
        category: "uncategorized".to_string(),
        confidence: FALLBACK_CONFIDENCE,
        reasoning: Some(format!(
            "rule-based fallback: severity derived from {}",
            if alert.label("severity").and_then(parse_severity_label).is_some() {
                "severity label"
            } else {
                "alertname prefix table"
            }
        )),
        action_items: Vec::new(),
        model: FALLBACK_MODEL.to_string(),
        processing_time_ms: started.elapsed().as_millis() as u64,
        is_fallback: true,
    }
}

fn parse_severity_label(value: &str) -> Option<Severity> {
    match value.to_lowercase().as_str() {
        "critical" => Some(Severity::Critical),
        "error" => Some(Severity::Error),
        "warning" => Some(Severity::Warning),
        "info" => Some(Severity::Info),
        _ => None,
    }
}

/// Cache-first → retry+circuit-breaker → fallback pipeline around an
/// [`LlmClient`].
pub struct LlmPipeline<O: RetryObserver = crate::retry::NullObserver> {
    client: Arc<dyn LlmClient>,
    cache: Arc<ClassificationCache>,
    breaker: Arc<CircuitBreaker>,
    retry_policy_factory: Box<dyn Fn() -> RetryPolicy + Send + Sync>,
    executor: RetryExecutor<O>,
}

impl LlmPipeline<crate::retry::NullObserver> {
    pub fn new(client: Arc<dyn LlmClient>, cache: Arc<ClassificationCache>, breaker: Arc<CircuitBreaker>) -> Self {
        Self {
            client,
            cache,
            breaker,
            retry_policy_factory: Box::new(RetryPolicy::llm_classification_default),
            executor: RetryExecutor::new(),
        }
    }
}

impl<O: RetryObserver> LlmPipeline<O> {
    pub fn with_observer(
        client: Arc<dyn LlmClient>,
        cache: Arc<ClassificationCache>,
        breaker: Arc<CircuitBreaker>,
        observer: O,
    ) -> Self {
        Self {
            client,
            cache,
            breaker,
            retry_policy_factory: Box::new(RetryPolicy::llm_classification_default),
            executor: RetryExecutor::with_observer(observer),
        }
    }

    /// Classify `alert`, never failing visibly.
    ///
    /// 1. Cache lookup by fingerprint; return on hit.
    /// 2. If the breaker is not open, call the LLM under the retry policy.
    /// 3. On success, cache and return the result.
    /// 4. On exhausted retries, breaker-open, or any other failure, return
    ///    the (uncached) rule-based fallback.
    pub async fn classify(&self, cancel: &CancellationToken, alert: &Alert) -> Classification {
        if let Some(cached) = self.cache.get(&alert.fingerprint) {
            return cached;
        }

        if !self.breaker.before_call() {
            tracing::warn!(fingerprint = %alert.fingerprint, "circuit breaker open, using fallback classification");
            return rule_based_fallback(alert);
        }

        let policy = (self.retry_policy_factory)();
        let client = Arc::clone(&self.client);
        let result = self
            .executor
            .with_retry_func(cancel, &policy, move || {
                let client = Arc::clone(&client);
                let alert = alert.clone();
                async move { client.classify(&alert).await }
            })
            .await;

        match result {
            Ok(classification) => {
                self.breaker.record_success();
                self.cache.put(alert.fingerprint.clone(), classification.clone());
                classification
            }
            Err(err) => {
                self.breaker.record_failure();
                tracing::warn!(fingerprint = %alert.fingerprint, error = %err, "llm classification failed, using fallback");
                rule_based_fallback(alert)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::breaker::CircuitBreakerConfig;
    use crate::classification::cache::ClassificationCacheConfig;
    use crate::model::AlertStatus;
    use chrono::Utc;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn alert(fingerprint: &str, labels: &[(&str, &str)]) -> Alert {
        Alert {
            labels: labels.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            annotations: HashMap::new(),
            starts_at: Utc::now(),
            ends_at: None,
            fingerprint: fingerprint.to_string(),
            status: AlertStatus::Firing,
        }
    }

    struct FlakyClient {
        fail_times: AtomicU32,
    }

    #[async_trait::async_trait]
    impl LlmClient for FlakyClient {
        async fn classify(&self, _alert: &Alert) -> anyhow::Result<Classification> {
            if self.fail_times.load(Ordering::SeqCst) > 0 {
                self.fail_times.fetch_sub(1, Ordering::SeqCst);
                anyhow::bail!("timeout calling llm");
            }
            Ok(Classification {
                severity: Severity::Error,
                category: "llm-derived".into(),
                confidence: 0.95,
                reasoning: Some("llm said so".into()),
                action_items: vec!["investigate".into()],
                model: "test-llm".into(),
                processing_time_ms: 5,
                is_fallback: false,
            })
        }
    }

    struct AlwaysFailClient;

    #[async_trait::async_trait]
    impl LlmClient for AlwaysFailClient {
        async fn classify(&self, _alert: &Alert) -> anyhow::Result<Classification> {
            anyhow::bail!("timeout calling llm")
        }
    }

    fn fresh_pipeline(client: Arc<dyn LlmClient>) -> LlmPipeline {
        LlmPipeline::new(
            client,
            Arc::new(ClassificationCache::new(ClassificationCacheConfig::default())),
            Arc::new(CircuitBreaker::new(CircuitBreakerConfig {
                failure_threshold: 10,
                reset_timeout: Duration::from_secs(30),
            })),
        )
    }

    #[tokio::test]
    async fn successful_classification_is_cached() {
        let pipeline = fresh_pipeline(Arc::new(FlakyClient { fail_times: AtomicU32::new(0) }));
        let a = alert("fp1", &[("alertname", "X")]);
        let result = pipeline.classify(&CancellationToken::new(), &a).await;
        assert!(!result.is_fallback);
        assert_eq!(pipeline.cache.len(), 1);
    }

    #[tokio::test]
    async fn falls_back_when_llm_exhausts_retries() {
        let pipeline = fresh_pipeline(Arc::new(AlwaysFailClient));
        let a = alert("fp2", &[("alertname", "OOMKilled"), ("severity", "bogus")]);
        let result = pipeline.classify(&CancellationToken::new(), &a).await;
        assert!(result.is_fallback);
        assert_eq!(result.severity, Severity::Critical); // OOM prefix
        assert_eq!(pipeline.cache.len(), 0); // fallback never cached
    }

    #[tokio::test]
    async fn open_breaker_short_circuits_without_calling_llm() {
        let client = Arc::new(AlwaysFailClient);
        let cache = Arc::new(ClassificationCache::new(ClassificationCacheConfig::default()));
        let breaker = Arc::new(CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            reset_timeout: Duration::from_secs(3600),
        }));
        breaker.record_failure(); // force-open
        let pipeline = LlmPipeline::new(client, cache, breaker);

        let a = alert("fp3", &[("severity", "warning")]);
        let result = pipeline.classify(&CancellationToken::new(), &a).await;
        assert!(result.is_fallback);
        assert_eq!(result.severity, Severity::Warning); // severity label wins
    }

    #[test]
    fn fallback_prefers_severity_label_over_alertname_prefix() {
        let a = alert("fp4", &[("alertname", "OOMKilled"), ("severity", "info")]);
        let result = rule_based_fallback(&a);
        assert_eq!(result.severity, Severity::Info);
        assert!(result.is_fallback);
    }

    #[test]
    fn fallback_defaults_to_info_with_no_signal() {
        let a = alert("fp5", &[]);
        let result = rule_based_fallback(&a);
        assert_eq!(result.severity, Severity::Info);
    }
}
