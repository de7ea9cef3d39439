//! Alert classification: cache-first, circuit-breaker-gated LLM calls with a
//! mandatory rule-based fallback.

pub mod breaker;
pub mod cache;
pub mod pipeline;
pub mod types;

pub use breaker::{BreakerState, CircuitBreaker, CircuitBreakerConfig};
pub use cache::{ClassificationCache, ClassificationCacheConfig, ClassificationCacheStats};
pub use pipeline::{rule_based_fallback, LlmClient, LlmPipeline};
pub use types::{Classification, Severity};
