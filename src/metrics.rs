//! Egress seam for telemetry. The concrete metrics registry (Prometheus,
//! StatsD, ...) is out of scope; [`MetricsSink`] is the shape the retry
//! executor drives, wired in by adapting [`crate::retry::RetryObserver`].

use std::time::Duration;

use crate::retry::{AttemptOutcome, ErrorClass};

/// The four counters/histograms the external-interfaces contract names.
/// A no-op default is provided so wiring a sink is opt-in.
pub trait MetricsSink: Send + Sync {
    fn record_retry_attempt(&self, _op: &str, _outcome: AttemptOutcome, _class: ErrorClass) {}
    fn observe_retry_duration(&self, _op: &str, _duration: Duration) {}
    fn observe_retry_backoff(&self, _op: &str, _delay: Duration) {}
    fn record_retry_final_attempts(&self, _op: &str, _attempts: u32) {}
}

/// No-op sink, used when the caller does not wire in a real registry.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullMetricsSink;
impl MetricsSink for NullMetricsSink {}

/// Adapts any [`MetricsSink`] into a [`crate::retry::RetryObserver`], so a
/// `RetryExecutor` can be constructed directly against a metrics registry.
pub struct MetricsObserver<S: MetricsSink> {
    sink: S,
}

impl<S: MetricsSink> MetricsObserver<S> {
    pub fn new(sink: S) -> Self {
        Self { sink }
    }
}

impl<S: MetricsSink> crate::retry::RetryObserver for MetricsObserver<S> {
    fn on_attempt(&self, op: &str, outcome: AttemptOutcome, class: ErrorClass, duration: Duration) {
        self.sink.record_retry_attempt(op, outcome, class);
        self.sink.observe_retry_duration(op, duration);
    }

    fn on_backoff(&self, op: &str, delay: Duration) {
        self.sink.observe_retry_backoff(op, delay);
    }

    fn on_final(&self, op: &str, attempts: u32, _succeeded: bool) {
        self.sink.record_retry_final_attempts(op, attempts);
    }
}
