//! PagerDuty receiver adapter: `Summary` (must render to under 1024
//! bytes) and a `Details` map; severity is mapped to PagerDuty's own
//! four-level vocabulary.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::classification::Severity;
use crate::error::{Result, SentinelError};
use crate::template::{TemplateData, TemplateEngine};

use super::is_template_source;

pub const SUMMARY_MAX_BYTES: usize = 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagerDutyConfig {
    pub summary: String,
    pub details: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderedPagerDuty {
    pub summary: String,
    pub severity: &'static str,
    pub details: HashMap<String, String>,
}

/// Map a classification severity onto PagerDuty's vocabulary:
/// `critical→critical, error→error, warning→warning, info/other→info`.
pub fn map_severity(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "critical",
        Severity::Error => "error",
        Severity::Warning => "warning",
        Severity::Info => "info",
    }
}

pub async fn process_pagerduty_config(
    engine: &TemplateEngine,
    cancel: &CancellationToken,
    config: &PagerDutyConfig,
    data: &TemplateData,
    severity: Severity,
) -> Result<RenderedPagerDuty> {
    let mut sources = HashMap::new();
    if is_template_source(&config.summary) {
        sources.insert("summary".to_string(), config.summary.clone());
    }
    for (key, value) in &config.details {
        if is_template_source(value) {
            sources.insert(format!("details.{key}"), value.clone());
        }
    }

    let (rendered, error) = engine.execute_multiple(cancel, &sources, data).await;
    if let Some(err) = error {
        return Err(err);
    }

    let summary = rendered.get("summary").cloned().unwrap_or_else(|| config.summary.clone());
    if summary.len() >= SUMMARY_MAX_BYTES {
        return Err(SentinelError::template_execute(
            &config.summary,
            format!("rendered summary is {} bytes, must be < {SUMMARY_MAX_BYTES}", summary.len()),
        ));
    }

    let details = config
        .details
        .iter()
        .map(|(key, value)| {
            let rendered_value = rendered.get(&format!("details.{key}")).cloned().unwrap_or_else(|| value.clone());
            (key.clone(), rendered_value)
        })
        .collect();

    Ok(RenderedPagerDuty { summary, severity: map_severity(severity), details })
}
