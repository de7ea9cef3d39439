//! Resilience primitives: pluggable error classification plus an
//! exponential-backoff retry executor with cancellation and telemetry
//! hooks. Used by the LLM classification pipeline and any other outbound
//! call a caller wires through it.

pub mod classifier;
pub mod executor;

pub use classifier::{
    AlwaysRetry, ChainedClassifier, DefaultClassifier, ErrorClass, ErrorClassifier,
    HttpClassifier, NeverRetry, TransientCapability,
};
pub use executor::{AttemptOutcome, NullObserver, RetryExecutor, RetryObserver, RetryPolicy};
