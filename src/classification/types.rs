//! [`Classification`]: the structured output of the LLM classification
//! pipeline, whether LLM-derived or produced by the rule-based fallback.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Severity::Critical => "critical",
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub severity: Severity,
    pub category: String,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    pub reasoning: Option<String>,
    pub action_items: Vec<String>,
    pub model: String,
    pub processing_time_ms: u64,
    /// True when this classification came from the rule-based fallback
    /// rather than the LLM; fallback results are never cached.
    pub is_fallback: bool,
}
