//! [`TemplateData`]: the Alertmanager-compatible record passed as the sole
//! input to template rendering.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SentinelError};
use crate::model::AlertStatus;

/// Structured input to a rendered template. Field names follow the
/// PascalCase convention of the upstream Alertmanager notification
/// payload so that dot-path template expressions (`.Labels.alertname`)
/// resolve directly against this shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TemplateData {
    pub status: AlertStatus,
    pub labels: HashMap<String, String>,
    pub annotations: HashMap<String, String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub value: Option<f64>,
    pub group_labels: HashMap<String, String>,
    pub common_labels: HashMap<String, String>,
    pub common_annotations: HashMap<String, String>,
    pub group_key: String,
    pub external_url: String,
    pub silence_url: Option<String>,
    pub receiver: String,
    pub receiver_type: String,
}

impl TemplateData {
    /// Validate the invariants `Execute` checks before rendering: `Status`
    /// well-formed (guaranteed by the type itself), labels present
    /// (possibly empty but never conceptually absent — always true for a
    /// constructed value), and `StartsAt` non-zero.
    pub fn validate(&self) -> Result<()> {
        if self.starts_at.timestamp() == 0 {
            return Err(SentinelError::TemplateData("StartsAt must not be the zero timestamp".to_string()));
        }
        Ok(())
    }
}
