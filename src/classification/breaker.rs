//! Three-state circuit breaker guarding the outbound LLM call.
//!
//! `closed` (initial) → `open` on `threshold` consecutive failures;
//! `open` → `half-open` on the first call after `reset_timeout` has
//! elapsed since the last failure; `half-open` → `closed` on one success
//! (failure count resets); `half-open` → `open` on any failure.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for BreakerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BreakerState::Closed => "closed",
            BreakerState::Open => "open",
            BreakerState::HalfOpen => "half-open",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, serde::Deserialize, serde::Serialize)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
        }
    }
}

/// Epoch used to store `Instant` in an `AtomicU64` as milliseconds since
/// breaker construction, since `Instant` itself is not atomic-friendly.
struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    fn now_millis(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Lock-free circuit breaker state machine, safe for concurrent callers.
pub struct CircuitBreaker {
    clock: MonotonicClock,
    config: CircuitBreakerConfig,
    state: AtomicU32, // 0 = closed, 1 = open, 2 = half-open
    consecutive_failures: AtomicU32,
    last_failure_millis: AtomicU64,
}

const STATE_CLOSED: u32 = 0;
const STATE_OPEN: u32 = 1;
const STATE_HALF_OPEN: u32 = 2;

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            clock: MonotonicClock { origin: Instant::now() },
            config,
            state: AtomicU32::new(STATE_CLOSED),
            consecutive_failures: AtomicU32::new(0),
            last_failure_millis: AtomicU64::new(0),
        }
    }

    fn raw_to_state(raw: u32) -> BreakerState {
        match raw {
            STATE_OPEN => BreakerState::Open,
            STATE_HALF_OPEN => BreakerState::HalfOpen,
            _ => BreakerState::Closed,
        }
    }

    /// Current state, resolving an `open` breaker to `half-open` once
    /// `reset_timeout` has elapsed since the last recorded failure. This
    /// resolution is idempotent to call from `before_call`.
    pub fn state(&self) -> BreakerState {
        let raw = self.state.load(Ordering::SeqCst);
        if raw == STATE_OPEN {
            let last_failure = self.last_failure_millis.load(Ordering::SeqCst);
            let elapsed = Duration::from_millis(self.clock.now_millis().saturating_sub(last_failure));
            if elapsed >= self.config.reset_timeout {
                return BreakerState::HalfOpen;
            }
            return BreakerState::Open;
        }
        Self::raw_to_state(raw)
    }

    /// Call before attempting the LLM call. Returns `false` (breaker open,
    /// short-circuit) or `true` (proceed — either closed, or the first
    /// half-open probe). When this transitions open → half-open, the
    /// internal state is updated so concurrent callers see the new state.
    pub fn before_call(&self) -> bool {
        match self.state() {
            BreakerState::Closed => true,
            BreakerState::HalfOpen => {
                self.state.store(STATE_HALF_OPEN, Ordering::SeqCst);
                true
            }
            BreakerState::Open => false,
        }
    }

    /// Record a successful call: half-open → closed (failure count
    /// resets); closed stays closed.
    pub fn record_success(&self) {
        let previous = self.state.swap(STATE_CLOSED, Ordering::SeqCst);
        if previous != STATE_CLOSED {
            tracing::info!(from = %Self::raw_to_state(previous), to = "closed", "circuit breaker transition");
        }
        self.consecutive_failures.store(0, Ordering::SeqCst);
    }

    /// Record a failed call: half-open → open immediately; closed → open
    /// once `failure_threshold` consecutive failures accumulate.
    pub fn record_failure(&self) {
        self.last_failure_millis.store(self.clock.now_millis(), Ordering::SeqCst);

        let current_raw = self.state.load(Ordering::SeqCst);
        if current_raw == STATE_HALF_OPEN {
            self.state.store(STATE_OPEN, Ordering::SeqCst);
            tracing::warn!("circuit breaker transition: half-open -> open");
            return;
        }

        let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
        if failures >= self.config.failure_threshold {
            let previous = self.state.swap(STATE_OPEN, Ordering::SeqCst);
            if previous != STATE_OPEN {
                tracing::warn!(failures, threshold = self.config.failure_threshold, "circuit breaker transition: closed -> open");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn config(threshold: u32, reset: Duration) -> CircuitBreakerConfig {
        CircuitBreakerConfig { failure_threshold: threshold, reset_timeout: reset }
    }

    #[test]
    fn starts_closed_and_allows_calls() {
        let b = CircuitBreaker::new(config(3, Duration::from_secs(30)));
        assert_eq!(b.state(), BreakerState::Closed);
        assert!(b.before_call());
    }

    #[test]
    fn opens_after_threshold_consecutive_failures() {
        let b = CircuitBreaker::new(config(3, Duration::from_secs(30)));
        b.record_failure();
        b.record_failure();
        assert_eq!(b.state(), BreakerState::Closed);
        b.record_failure();
        assert_eq!(b.state(), BreakerState::Open);
        assert!(!b.before_call());
    }

    // Real-clock sleeps make these timing-sensitive; #[serial] keeps
    // scheduler contention from other tests from pushing elapsed() past
    // the reset_timeout window before the intended assertion.
    #[test]
    #[serial]
    fn half_open_after_reset_timeout_then_closes_on_success() {
        let b = CircuitBreaker::new(config(1, Duration::from_millis(10)));
        b.record_failure();
        assert_eq!(b.state(), BreakerState::Open);
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(b.state(), BreakerState::HalfOpen);
        assert!(b.before_call());
        b.record_success();
        assert_eq!(b.state(), BreakerState::Closed);
    }

    #[test]
    #[serial]
    fn half_open_reopens_on_failure() {
        let b = CircuitBreaker::new(config(1, Duration::from_millis(10)));
        b.record_failure();
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(b.state(), BreakerState::HalfOpen);
        b.before_call();
        b.record_failure();
        assert_eq!(b.state(), BreakerState::Open);
    }

    #[test]
    fn success_resets_consecutive_failure_count() {
        let b = CircuitBreaker::new(config(3, Duration::from_secs(30)));
        b.record_failure();
        b.record_failure();
        b.record_success();
        b.record_failure();
        b.record_failure();
        assert_eq!(b.state(), BreakerState::Closed); // only 2 consecutive since reset
    }
}
