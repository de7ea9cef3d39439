//! # Error Handling Module
//!
//! Defines the error vocabulary used throughout the sentinel core: silence
//! matching, the retry executor, the classification pipeline, and the
//! notification template engine all surface variants of [`SentinelError`].
//!
//! ## Error Categories
//!
//! - `InvalidAlert` / `InvalidSilence`: input-validation errors, never retried.
//! - `RegexCompilationFailed`: a silence matcher's pattern failed to compile.
//! - `ContextCancelled`: the caller's cancellation token fired mid-operation.
//! - `NonRetryable`: sentinel consulted by the default error classifier.
//! - `BreakerOpen`: the classification pipeline's circuit breaker is open.
//! - `TemplateParse` / `TemplateExecute` / `TemplateTimeout` / `TemplateData`:
//!   the four template engine failure modes.

use thiserror::Error;

/// Result type alias for sentinel core operations.
pub type Result<T> = std::result::Result<T, SentinelError>;

/// Truncate a template source to at most 100 bytes for error messages,
/// always on a UTF-8 char boundary.
pub(crate) fn truncate_source(source: &str) -> String {
    if source.len() <= 100 {
        return source.to_string();
    }
    let mut end = 100;
    while !source.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &source[..end])
}

/// Comprehensive error type for the sentinel core.
#[derive(Error, Debug)]
pub enum SentinelError {
    /// The alert passed to a matching or pipeline operation is invalid
    /// (e.g. missing labels).
    #[error("invalid alert: {0}")]
    InvalidAlert(String),

    /// The silence passed to a matching operation is invalid (absent, or
    /// zero matchers).
    #[error("invalid silence: {0}")]
    InvalidSilence(String),

    /// A regex matcher's pattern failed to compile.
    #[error("regex compilation failed for pattern {pattern:?}: {source}")]
    RegexCompilationFailed {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// The caller's context/cancellation token was observed cancelled.
    #[error("operation cancelled")]
    ContextCancelled,

    /// Sentinel consulted by the default [`crate::retry::ErrorClassifier`]:
    /// any error wrapping this is never retried.
    #[error("non-retryable error: {0}")]
    NonRetryable(String),

    /// All configured retry attempts were exhausted.
    #[error("operation {op:?} failed after {attempts} attempt(s): {source}")]
    RetriesExhausted {
        op: String,
        attempts: u32,
        #[source]
        source: anyhow::Error,
    },

    /// The classification pipeline's circuit breaker is open; the LLM call
    /// was short-circuited without being attempted.
    #[error("circuit breaker open for {0}")]
    BreakerOpen(String),

    /// A template failed to parse.
    #[error("template parse error in {source_excerpt:?}: {message}")]
    TemplateParse {
        source_excerpt: String,
        message: String,
    },

    /// A template parsed but failed during execution.
    #[error("template execute error in {source_excerpt:?}: {message}")]
    TemplateExecute {
        source_excerpt: String,
        message: String,
    },

    /// A template's execution exceeded its deadline.
    #[error("template execution timed out after {elapsed_ms}ms in {source_excerpt:?}")]
    TemplateTimeout {
        source_excerpt: String,
        elapsed_ms: u64,
    },

    /// The `TemplateData` passed to `Execute`/`ExecuteMultiple` failed
    /// validation.
    #[error("invalid template data: {0}")]
    TemplateData(String),

    /// Generic catch-all for conditions not covered above.
    #[error("{0}")]
    Generic(String),
}

impl SentinelError {
    pub fn invalid_alert<S: Into<String>>(message: S) -> Self {
        Self::InvalidAlert(message.into())
    }

    pub fn invalid_silence<S: Into<String>>(message: S) -> Self {
        Self::InvalidSilence(message.into())
    }

    pub fn template_parse(source: &str, message: impl Into<String>) -> Self {
        Self::TemplateParse {
            source_excerpt: truncate_source(source),
            message: message.into(),
        }
    }

    pub fn template_execute(source: &str, message: impl Into<String>) -> Self {
        Self::TemplateExecute {
            source_excerpt: truncate_source(source),
            message: message.into(),
        }
    }

    pub fn template_timeout(source: &str, elapsed_ms: u64) -> Self {
        Self::TemplateTimeout {
            source_excerpt: truncate_source(source),
            elapsed_ms,
        }
    }

    /// True for the input-validation family that is never retried (see
    /// propagation policy in the matcher and template engine docs).
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidAlert(_)
                | Self::InvalidSilence(_)
                | Self::RegexCompilationFailed { .. }
                | Self::TemplateParse { .. }
                | Self::TemplateData(_)
        )
    }
}
