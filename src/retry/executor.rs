//! Exponential-backoff retry executor with pluggable classification and
//! telemetry hooks.
//!
//! Grounded on the teacher's `GitHubApiClient::execute_gh_command` loop in
//! `github_api.rs`: the same attempt/backoff/classify shape, generalized
//! from a GitHub-specific client into a reusable executor parameterized by
//! an [`ErrorClassifier`] and driven by a `tokio_util::sync::CancellationToken`
//! instead of the GitHub client's implicit "run until the process exits."

use std::future::Future;
use std::time::{Duration, Instant};

use rand::Rng;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, SentinelError};
use crate::retry::classifier::{ChainedClassifier, DefaultClassifier, ErrorClass, ErrorClassifier};

/// Per-attempt/per-operation telemetry sink. A no-op default is provided;
/// implement against a real metrics registry (out of scope here, see the
/// egress `MetricsSink` trait in `crate::metrics`) to wire the four
/// counters/histograms from the external-interfaces contract.
pub trait RetryObserver: Send + Sync {
    fn on_attempt(&self, _op: &str, _outcome: AttemptOutcome, _class: ErrorClass, _duration: Duration) {}
    fn on_backoff(&self, _op: &str, _delay: Duration) {}
    fn on_final(&self, _op: &str, _attempts: u32, _succeeded: bool) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    Failure,
    Cancelled,
}

/// No-op observer used when the caller does not need telemetry.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;
impl RetryObserver for NullObserver {}

/// Retry policy: max attempts, exponential backoff schedule, and the
/// classifier that decides whether a given failure is worth retrying.
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Multiplier applied to the delay after each attempt; contract bound
    /// to `1.5..=3.0`.
    pub multiplier: f64,
    pub jitter: bool,
    pub classifier: Box<dyn ErrorClassifier>,
    pub op_name: Option<String>,
}

impl RetryPolicy {
    /// The policy recommended for the LLM classification pipeline:
    /// `{max_retries: 3, base_delay: 1s, max_delay: 10s, multiplier: 2,
    /// jitter: true}` with the HTTP+Default chained classifier.
    pub fn llm_classification_default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
            jitter: true,
            classifier: Box::new(ChainedClassifier::http_and_default()),
            op_name: Some("llm_classify".to_string()),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            multiplier: 2.0,
            jitter: false,
            classifier: Box::new(DefaultClassifier),
            op_name: None,
        }
    }
}

/// Runs operations under a [`RetryPolicy`], handling backoff scheduling,
/// classifier consultation, and cancellation.
pub struct RetryExecutor<O: RetryObserver = NullObserver> {
    observer: O,
}

impl RetryExecutor<NullObserver> {
    pub fn new() -> Self {
        Self { observer: NullObserver }
    }
}

impl Default for RetryExecutor<NullObserver> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: RetryObserver> RetryExecutor<O> {
    pub fn with_observer(observer: O) -> Self {
        Self { observer }
    }

    /// Invoke `op` up to `policy.max_retries + 1` times. Returns `Ok(())`
    /// on success. If the classifier reports a failure as non-retryable,
    /// returns immediately. Between attempts, sleeps the current backoff
    /// delay (bounded by `max_delay`, jittered up to 10% when enabled);
    /// cancellation aborts the sleep promptly.
    pub async fn with_retry<F, Fut>(&self, cancel: &CancellationToken, policy: &RetryPolicy, mut op: F) -> Result<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        self.with_retry_func(cancel, policy, || {
            let fut = op();
            async move { fut.await.map(|_| ()) }
        })
        .await
        .map(|_| ())
    }

    /// Identical contract to [`Self::with_retry`], but also returns the
    /// last observed successful result of type `T`.
    pub async fn with_retry_func<F, Fut, T>(&self, cancel: &CancellationToken, policy: &RetryPolicy, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let op_name = policy.op_name.as_deref().unwrap_or("operation");
        let mut attempt: u32 = 0;
        let mut delay = policy.base_delay;

        loop {
            if cancel.is_cancelled() {
                self.observer.on_final(op_name, attempt, false);
                return Err(SentinelError::ContextCancelled);
            }

            attempt += 1;
            let started = Instant::now();
            match op().await {
                Ok(value) => {
                    self.observer.on_attempt(op_name, AttemptOutcome::Success, ErrorClass::None, started.elapsed());
                    self.observer.on_final(op_name, attempt, true);
                    return Ok(value);
                }
                Err(err) => {
                    let class = ErrorClass::classify(&err);
                    self.observer.on_attempt(op_name, AttemptOutcome::Failure, class, started.elapsed());

                    if !policy.classifier.is_retryable(&err) {
                        self.observer.on_final(op_name, attempt, false);
                        return Err(SentinelError::NonRetryable(err.to_string()));
                    }

                    if attempt > policy.max_retries {
                        self.observer.on_final(op_name, attempt, false);
                        return Err(SentinelError::RetriesExhausted {
                            op: op_name.to_string(),
                            attempts: attempt,
                            source: err,
                        });
                    }
                }
            }

            let wait = Self::next_delay(delay, policy.jitter);
            self.observer.on_backoff(op_name, wait);

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = cancel.cancelled() => {
                    self.observer.on_attempt(op_name, AttemptOutcome::Cancelled, ErrorClass::ContextCancelled, Duration::ZERO);
                    self.observer.on_final(op_name, attempt, false);
                    return Err(SentinelError::ContextCancelled);
                }
            }

            delay = Duration::from_secs_f64((delay.as_secs_f64() * policy.multiplier).min(policy.max_delay.as_secs_f64()));
        }
    }

    /// Compute the actual sleep duration for a given base delay, adding up
    /// to 10% uniform jitter when enabled. The jittered value is always
    /// `>= delay` and `<= delay * 1.10`.
    fn next_delay(delay: Duration, jitter: bool) -> Duration {
        if !jitter {
            return delay;
        }
        let max_extra = delay.as_secs_f64() * 0.10;
        let extra = if max_extra > 0.0 {
            rand::thread_rng().gen_range(0.0..=max_extra)
        } else {
            0.0
        };
        Duration::from_secs_f64(delay.as_secs_f64() + extra)
    }
}
