//! # sentinel-core
//!
//! An alert notification core: silence matching, LLM-backed alert
//! classification with a mandatory deterministic fallback, generic
//! resilience primitives (error classification, retry with backoff and
//! cancellation, circuit breaking), and a sandboxed notification template
//! engine.
//!
//! ## Features
//!
//! - **Resilient by default**: every outbound call is retried under a
//!   pluggable [`retry::ErrorClassifier`] and gated by a circuit breaker;
//!   classification never fails visibly thanks to a rule-based fallback.
//! - **Cooperative cancellation**: long-running operations accept a
//!   `tokio_util::sync::CancellationToken` and unwind promptly.
//! - **Sandboxed templating**: notification templates run inside a fixed
//!   function registry with no filesystem or network access.

pub mod classification;
pub mod config;
pub mod error;
pub mod metrics;
pub mod model;
pub mod receivers;
pub mod regex_cache;
pub mod retry;
pub mod silence;
pub mod store;
pub mod template;

pub use crate::config::SentinelConfig;
pub use crate::error::{Result, SentinelError};
pub use crate::model::{Alert, AlertStatus, Matcher, MatcherType, Silence, SilenceStatus};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
