//! Data model shared by the silence matcher, the classification pipeline,
//! and the template engine: [`Alert`], [`Matcher`], [`Silence`], and the
//! derived [`SilenceStatus`].

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Label/annotation name grammar: `[A-Za-z_][A-Za-z0-9_]*`.
static LABEL_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static label name regex"));

/// Returns true if `name` conforms to the label-name grammar.
pub fn is_valid_label_name(name: &str) -> bool {
    LABEL_NAME_RE.is_match(name)
}

/// Firing/resolved lifecycle of an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Firing,
    Resolved,
}

impl std::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertStatus::Firing => write!(f, "firing"),
            AlertStatus::Resolved => write!(f, "resolved"),
        }
    }
}

/// The unit being evaluated by the silence matcher and classification
/// pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub labels: HashMap<String, String>,
    pub annotations: HashMap<String, String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    /// Opaque stable identifier derived from labels; used as the
    /// classification-cache key.
    pub fingerprint: String,
    pub status: AlertStatus,
}

impl Alert {
    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels.get(name).map(String::as_str)
    }
}

/// One atomic predicate inside a [`Silence`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Matcher {
    pub name: String,
    pub value: String,
    #[serde(rename = "type")]
    pub kind: MatcherType,
}

/// Matcher comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatcherType {
    /// `=`
    Equal,
    /// `!=`
    NotEqual,
    /// `=~`
    Regex,
    /// `!~`
    NotRegex,
}

impl MatcherType {
    pub fn is_regex(self) -> bool {
        matches!(self, MatcherType::Regex | MatcherType::NotRegex)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MatcherType::Equal => "=",
            MatcherType::NotEqual => "!=",
            MatcherType::Regex => "=~",
            MatcherType::NotRegex => "!~",
        }
    }
}

/// Upper bound on [`Matcher::value`] and [`Silence::comment`]/`created_by`,
/// in bytes.
pub const MATCHER_VALUE_MAX_BYTES: usize = 1024;
pub const SILENCE_MATCHERS_MIN: usize = 1;
pub const SILENCE_MATCHERS_MAX: usize = 100;
pub const CREATED_BY_MAX_BYTES: usize = 255;
pub const COMMENT_MIN_BYTES: usize = 3;
pub const COMMENT_MAX_BYTES: usize = 1024;

impl Matcher {
    /// Validate the structural invariants from the data model: identifier
    /// grammar, value length, and (for regex matchers) that the pattern
    /// compiles.
    pub fn validate(&self) -> Result<(), String> {
        if !is_valid_label_name(&self.name) {
            return Err(format!("matcher name {:?} is not a valid identifier", self.name));
        }
        if self.value.len() > MATCHER_VALUE_MAX_BYTES {
            return Err(format!(
                "matcher value for {:?} exceeds {} bytes",
                self.name, MATCHER_VALUE_MAX_BYTES
            ));
        }
        if self.kind.is_regex() {
            Regex::new(&self.value)
                .map_err(|e| format!("invalid regex {:?}: {e}", self.value))?;
        }
        Ok(())
    }
}

/// Derived lifecycle status of a [`Silence`], computed from wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SilenceStatus {
    Pending,
    Active,
    Expired,
}

/// A time-bounded conjunction of matchers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Silence {
    pub id: String,
    pub created_by: String,
    pub comment: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub matchers: Vec<Matcher>,
}

impl Silence {
    /// Compute the silence's lifecycle status at `now`.
    pub fn status_at(&self, now: DateTime<Utc>) -> SilenceStatus {
        if now < self.starts_at {
            SilenceStatus::Pending
        } else if now < self.ends_at {
            SilenceStatus::Active
        } else {
            SilenceStatus::Expired
        }
    }

    /// Validate the structural invariants from the data model.
    pub fn validate(&self) -> Result<(), String> {
        if self.created_by.is_empty() || self.created_by.len() > CREATED_BY_MAX_BYTES {
            return Err(format!(
                "created_by must be 1-{CREATED_BY_MAX_BYTES} bytes, got {}",
                self.created_by.len()
            ));
        }
        if self.comment.len() < COMMENT_MIN_BYTES || self.comment.len() > COMMENT_MAX_BYTES {
            return Err(format!(
                "comment must be {COMMENT_MIN_BYTES}-{COMMENT_MAX_BYTES} bytes, got {}",
                self.comment.len()
            ));
        }
        if self.starts_at >= self.ends_at {
            return Err("starts_at must be strictly before ends_at".to_string());
        }
        if self.matchers.len() < SILENCE_MATCHERS_MIN || self.matchers.len() > SILENCE_MATCHERS_MAX {
            return Err(format!(
                "silence must have {SILENCE_MATCHERS_MIN}-{SILENCE_MATCHERS_MAX} matchers, got {}",
                self.matchers.len()
            ));
        }
        for m in &self.matchers {
            m.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_name_grammar() {
        assert!(is_valid_label_name("alertname"));
        assert!(is_valid_label_name("_private"));
        assert!(is_valid_label_name("a1_b2"));
        assert!(!is_valid_label_name("1alert"));
        assert!(!is_valid_label_name("alert-name"));
        assert!(!is_valid_label_name(""));
    }

    #[test]
    fn silence_status_transitions_on_wall_clock() {
        let now = Utc::now();
        let silence = Silence {
            id: "id".into(),
            created_by: "ops".into(),
            comment: "test".into(),
            starts_at: now - chrono::Duration::hours(1),
            ends_at: now + chrono::Duration::hours(1),
            matchers: vec![Matcher {
                name: "alertname".into(),
                value: "X".into(),
                kind: MatcherType::Equal,
            }],
        };
        assert_eq!(silence.status_at(now), SilenceStatus::Active);
        assert_eq!(
            silence.status_at(now - chrono::Duration::hours(2)),
            SilenceStatus::Pending
        );
        assert_eq!(
            silence.status_at(now + chrono::Duration::hours(2)),
            SilenceStatus::Expired
        );
    }

    #[test]
    fn silence_validate_rejects_inverted_time_range() {
        let now = Utc::now();
        let silence = Silence {
            id: "id".into(),
            created_by: "ops".into(),
            comment: "test".into(),
            starts_at: now,
            ends_at: now,
            matchers: vec![Matcher {
                name: "alertname".into(),
                value: "X".into(),
                kind: MatcherType::Equal,
            }],
        };
        assert!(silence.validate().is_err());
    }
}
