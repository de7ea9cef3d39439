//! Pluggable error classifiers: decide whether a failed operation should
//! be retried.
//!
//! Grounded on the teacher's `GitHubApiClient::is_retryable_error` /
//! `is_rate_limit_error` substring checks in `github_api.rs`, generalized
//! into an explicit trait so the retry executor is not hard-wired to
//! GitHub's error shapes.

use std::error::Error as StdError;

/// Capability an error type can expose so the classifier does not have to
/// fall back to substring sniffing. Mirrors the "duck-typed
/// temporary/timeout capability" design note: implement this for any error
/// type that actually knows whether it is transient.
pub trait TransientCapability {
    fn is_temporary(&self) -> bool {
        false
    }
    fn is_timeout(&self) -> bool {
        false
    }
}

impl TransientCapability for std::io::Error {
    fn is_temporary(&self) -> bool {
        matches!(
            self.kind(),
            std::io::ErrorKind::ConnectionRefused
                | std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::NetworkUnreachable
                | std::io::ErrorKind::HostUnreachable
        )
    }

    fn is_timeout(&self) -> bool {
        self.kind() == std::io::ErrorKind::TimedOut
    }
}

/// Decides whether a given error is worth retrying.
pub trait ErrorClassifier: Send + Sync {
    fn is_retryable(&self, err: &anyhow::Error) -> bool;
}

/// Substrings recognized as transient by [`DefaultClassifier`] when the
/// error's `Display` output offers no other signal. Last-resort fallback,
/// kept as a known, testable path rather than an accidental one.
const TRANSIENT_SUBSTRINGS: &[&str] = &["timeout", "deadline exceeded", "i/o timeout", "timed out"];

const TRANSIENT_ERRNO_NAMES: &[&str] =
    &["econnrefused", "econnreset", "enetunreach", "ehostunreach"];

/// Default classifier: never retries [`crate::error::SentinelError::NonRetryable`]
/// (or anything wrapping it), recognizes common transient network/DNS/timeout
/// signals, and otherwise treats unknown errors as retryable.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultClassifier;

impl ErrorClassifier for DefaultClassifier {
    fn is_retryable(&self, err: &anyhow::Error) -> bool {
        if err
            .chain()
            .any(|cause| matches!(cause.downcast_ref::<crate::error::SentinelError>(), Some(crate::error::SentinelError::NonRetryable(_))))
        {
            return false;
        }

        if err.chain().any(is_transient_capable) {
            return true;
        }

        let message = err.to_string().to_lowercase();
        if TRANSIENT_SUBSTRINGS.iter().any(|s| message.contains(s)) {
            return true;
        }
        if TRANSIENT_ERRNO_NAMES.iter().any(|s| message.contains(s)) {
            return true;
        }
        if message.contains("dns") && (message.contains("temporary") || message.contains("timeout")) {
            return true;
        }

        // Unknown errors are retried by default; the non-retryable sentinel
        // above is the explicit opt-out.
        true
    }
}

/// Retries on 5xx, 429, and 408, each individually toggleable; delegates
/// everything else to [`DefaultClassifier`].
#[derive(Debug, Clone, Copy)]
pub struct HttpClassifier {
    pub retry_5xx: bool,
    pub retry_429: bool,
    pub retry_408: bool,
}

impl Default for HttpClassifier {
    fn default() -> Self {
        Self {
            retry_5xx: true,
            retry_429: true,
            retry_408: true,
        }
    }
}

impl HttpClassifier {
    /// Extract an HTTP status code from `err`'s display chain, if present.
    /// Mirrors the teacher's `is_rate_limit_error`'s substring sniffing,
    /// since the HTTP client in use is opaque to this classifier.
    fn status_code(err: &anyhow::Error) -> Option<u16> {
        let text = err.to_string();
        text.split_whitespace()
            .find_map(|tok| tok.trim_matches(|c: char| !c.is_ascii_digit()).parse::<u16>().ok())
            .filter(|code| (100..=599).contains(code))
    }
}

impl ErrorClassifier for HttpClassifier {
    fn is_retryable(&self, err: &anyhow::Error) -> bool {
        if let Some(code) = Self::status_code(err) {
            if self.retry_5xx && (500..600).contains(&code) {
                return true;
            }
            if self.retry_429 && code == 429 {
                return true;
            }
            if self.retry_408 && code == 408 {
                return true;
            }
        }
        DefaultClassifier.is_retryable(err)
    }
}

/// ORs a list of classifiers; an empty chain never retries.
pub struct ChainedClassifier {
    classifiers: Vec<Box<dyn ErrorClassifier>>,
}

impl ChainedClassifier {
    pub fn new(classifiers: Vec<Box<dyn ErrorClassifier>>) -> Self {
        Self { classifiers }
    }

    /// The policy recommended for the LLM classification pipeline: HTTP
    /// status handling, falling back to the default network/timeout
    /// heuristics.
    pub fn http_and_default() -> Self {
        Self::new(vec![Box::new(HttpClassifier::default()), Box::new(DefaultClassifier)])
    }
}

impl ErrorClassifier for ChainedClassifier {
    fn is_retryable(&self, err: &anyhow::Error) -> bool {
        self.classifiers.iter().any(|c| c.is_retryable(err))
    }
}

/// Test double: nothing is ever retryable.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverRetry;

impl ErrorClassifier for NeverRetry {
    fn is_retryable(&self, _err: &anyhow::Error) -> bool {
        false
    }
}

/// Test double: everything is retryable.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysRetry;

impl ErrorClassifier for AlwaysRetry {
    fn is_retryable(&self, _err: &anyhow::Error) -> bool {
        true
    }
}

/// Metric class bucket derived from an error, in the precedence order
/// fixed by the retry executor's observability contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    None,
    ContextCancelled,
    ContextDeadline,
    Dns,
    Network,
    RateLimit,
    Timeout,
    Unknown,
}

impl ErrorClass {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorClass::None => "none",
            ErrorClass::ContextCancelled => "context_cancelled",
            ErrorClass::ContextDeadline => "context_deadline",
            ErrorClass::Dns => "dns",
            ErrorClass::Network => "network",
            ErrorClass::RateLimit => "rate_limit",
            ErrorClass::Timeout => "timeout",
            ErrorClass::Unknown => "unknown",
        }
    }

    pub fn classify(err: &anyhow::Error) -> Self {
        if err
            .chain()
            .any(|c| matches!(c.downcast_ref::<crate::error::SentinelError>(), Some(crate::error::SentinelError::ContextCancelled)))
        {
            return ErrorClass::ContextCancelled;
        }
        let message = err.to_string().to_lowercase();
        if message.contains("deadline") {
            return ErrorClass::ContextDeadline;
        }
        if message.contains("dns") {
            return ErrorClass::Dns;
        }
        if message.contains("429") || message.contains("rate limit") {
            return ErrorClass::RateLimit;
        }
        if TRANSIENT_SUBSTRINGS.iter().any(|s| message.contains(s)) {
            return ErrorClass::Timeout;
        }
        if TRANSIENT_ERRNO_NAMES.iter().any(|s| message.contains(s)) {
            return ErrorClass::Network;
        }
        ErrorClass::Unknown
    }
}

/// Helper used by classifiers that want to inspect a boxed error object
/// implementing [`TransientCapability`] without downcasting concrete types.
/// `std::io::Error` is the only capability-bearing type known to this crate
/// today; other concrete error types can implement `TransientCapability`
/// and extend this downcast chain as they're introduced.
pub fn is_transient_capable(err: &(dyn StdError + 'static)) -> bool {
    err.downcast_ref::<std::io::Error>()
        .map(|io_err| io_err.is_temporary() || io_err.is_timeout())
        .unwrap_or(false)
}
