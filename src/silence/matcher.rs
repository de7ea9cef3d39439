//! [`SilenceMatcher`]: evaluates [`Matcher`](crate::model::Matcher)
//! predicates against an [`Alert`](crate::model::Alert).

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::{Result, SentinelError};
use crate::model::{Alert, Matcher, MatcherType, Silence};
use crate::regex_cache::RegexCache;

/// Outcome of [`SilenceMatcher::matches_any`]: the IDs matched so far, plus
/// the cancellation error if iteration was cut short. Partial progress is
/// always returned alongside cancellation, per the suspension-point
/// contract: callers that only care about the happy path can call
/// `.into_result()`.
#[derive(Debug)]
pub struct MatchesAnyOutcome {
    pub matched_ids: Vec<String>,
    pub cancelled: Option<SentinelError>,
}

impl MatchesAnyOutcome {
    /// Collapse into a `Result`, discarding partial progress on
    /// cancellation. Prefer reading `matched_ids` directly when partial
    /// results matter.
    pub fn into_result(self) -> Result<Vec<String>> {
        match self.cancelled {
            Some(err) => Err(err),
            None => Ok(self.matched_ids),
        }
    }
}

/// Evaluates silences against alerts using a shared [`RegexCache`].
pub struct SilenceMatcher {
    regex_cache: Arc<RegexCache>,
}

impl SilenceMatcher {
    pub fn new(regex_cache: Arc<RegexCache>) -> Self {
        Self { regex_cache }
    }

    /// AND over every matcher in `silence`, with early exit on the first
    /// `false`. Checks `cancel` before evaluating each matcher.
    pub fn matches(&self, cancel: &CancellationToken, alert: &Alert, silence: &Silence) -> Result<bool> {
        if silence.matchers.is_empty() {
            return Err(SentinelError::invalid_silence("silence has zero matchers"));
        }

        for matcher in &silence.matchers {
            if cancel.is_cancelled() {
                return Err(SentinelError::ContextCancelled);
            }
            if !self.matches_one(alert, matcher)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Evaluate `silences` in order, returning the IDs of every silence
    /// that matches. A per-silence error (malformed silence, bad regex)
    /// demotes to skip-and-continue so one bad silence cannot poison the
    /// whole evaluation; cancellation stops iteration immediately and
    /// surfaces whatever IDs had already matched.
    pub fn matches_any(
        &self,
        cancel: &CancellationToken,
        alert: &Alert,
        silences: &[Silence],
    ) -> MatchesAnyOutcome {
        let mut matched_ids = Vec::new();

        for silence in silences {
            if cancel.is_cancelled() {
                return MatchesAnyOutcome {
                    matched_ids,
                    cancelled: Some(SentinelError::ContextCancelled),
                };
            }

            match self.matches(cancel, alert, silence) {
                Ok(true) => matched_ids.push(silence.id.clone()),
                Ok(false) => {}
                Err(SentinelError::ContextCancelled) => {
                    return MatchesAnyOutcome {
                        matched_ids,
                        cancelled: Some(SentinelError::ContextCancelled),
                    };
                }
                Err(err) => {
                    tracing::warn!(silence_id = %silence.id, error = %err, "skipping malformed silence");
                }
            }
        }

        MatchesAnyOutcome {
            matched_ids,
            cancelled: None,
        }
    }

    fn matches_one(&self, alert: &Alert, matcher: &Matcher) -> Result<bool> {
        let label_value = alert.label(&matcher.name);

        let result = match matcher.kind {
            MatcherType::Equal => match label_value {
                Some(v) => v == matcher.value,
                None => false,
            },
            MatcherType::NotEqual => match label_value {
                Some(v) => v != matcher.value,
                None => true,
            },
            MatcherType::Regex => match label_value {
                None => false,
                Some(v) => self.regex_cache.get(&matcher.value)?.is_match(v),
            },
            MatcherType::NotRegex => match label_value {
                None => true,
                Some(v) => !self.regex_cache.get(&matcher.value)?.is_match(v),
            },
        };
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::HashMap;

    fn alert(labels: &[(&str, &str)]) -> Alert {
        Alert {
            labels: labels.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            annotations: HashMap::new(),
            starts_at: Utc::now(),
            ends_at: None,
            fingerprint: "fp".into(),
            status: crate::model::AlertStatus::Firing,
        }
    }

    fn silence(matchers: Vec<Matcher>) -> Silence {
        Silence {
            id: "sil-1".into(),
            created_by: "ops".into(),
            comment: "test silence".into(),
            starts_at: Utc::now() - chrono::Duration::hours(1),
            ends_at: Utc::now() + chrono::Duration::hours(1),
            matchers,
        }
    }

    fn new_matcher() -> SilenceMatcher {
        SilenceMatcher::new(Arc::new(RegexCache::default()))
    }

    #[test]
    fn scenario_equal_and_regex_conjunction() {
        let m = new_matcher();
        let a = alert(&[("alertname", "HighCPU"), ("job", "api-server"), ("severity", "critical")]);
        let s = silence(vec![
            Matcher { name: "alertname".into(), value: "HighCPU".into(), kind: MatcherType::Equal },
            Matcher { name: "severity".into(), value: "(critical|warning)".into(), kind: MatcherType::Regex },
        ]);
        assert!(m.matches(&CancellationToken::new(), &a, &s).unwrap());
    }

    #[test]
    fn missing_label_satisfies_not_equal() {
        let m = new_matcher();
        let a = alert(&[("alertname", "HighCPU")]);
        let s = silence(vec![Matcher { name: "env".into(), value: "prod".into(), kind: MatcherType::NotEqual }]);
        assert!(m.matches(&CancellationToken::new(), &a, &s).unwrap());
    }

    #[test]
    fn missing_label_satisfies_not_regex() {
        let m = new_matcher();
        let a = alert(&[("alertname", "HighCPU")]);
        let s = silence(vec![Matcher { name: "env".into(), value: "prod.*".into(), kind: MatcherType::NotRegex }]);
        assert!(m.matches(&CancellationToken::new(), &a, &s).unwrap());
    }

    #[test]
    fn missing_label_fails_equal_and_regex() {
        let m = new_matcher();
        let a = alert(&[("alertname", "HighCPU")]);
        let eq = silence(vec![Matcher { name: "env".into(), value: "prod".into(), kind: MatcherType::Equal }]);
        let re = silence(vec![Matcher { name: "env".into(), value: "prod.*".into(), kind: MatcherType::Regex }]);
        assert!(!m.matches(&CancellationToken::new(), &a, &eq).unwrap());
        assert!(!m.matches(&CancellationToken::new(), &a, &re).unwrap());
    }

    #[test]
    fn zero_matchers_is_invalid_silence() {
        let m = new_matcher();
        let a = alert(&[("alertname", "X")]);
        let s = silence(vec![]);
        assert!(matches!(
            m.matches(&CancellationToken::new(), &a, &s),
            Err(SentinelError::InvalidSilence(_))
        ));
    }

    #[test]
    fn invalid_regex_pattern_surfaces_compilation_error() {
        let m = new_matcher();
        let a = alert(&[("alertname", "X")]);
        let s = silence(vec![Matcher { name: "alertname".into(), value: "[".into(), kind: MatcherType::Regex }]);
        assert!(matches!(
            m.matches(&CancellationToken::new(), &a, &s),
            Err(SentinelError::RegexCompilationFailed { .. })
        ));
    }

    #[test]
    fn matches_any_preserves_silence_order_and_ids() {
        let m = new_matcher();
        let a = alert(&[("alertname", "HighCPU"), ("severity", "critical")]);
        let s1 = Silence { id: "s1".into(), ..silence(vec![Matcher { name: "alertname".into(), value: "HighCPU".into(), kind: MatcherType::Equal }]) };
        let s2 = Silence { id: "s2".into(), ..silence(vec![Matcher { name: "severity".into(), value: "warning".into(), kind: MatcherType::Equal }]) };
        let s3 = Silence { id: "s3".into(), ..silence(vec![Matcher { name: "severity".into(), value: "critical".into(), kind: MatcherType::Equal }]) };
        let outcome = m.matches_any(&CancellationToken::new(), &a, &[s1, s2, s3]);
        assert_eq!(outcome.matched_ids, vec!["s1".to_string(), "s3".to_string()]);
        assert!(outcome.cancelled.is_none());
    }

    #[test]
    fn matches_any_skips_malformed_silence_and_continues() {
        let m = new_matcher();
        let a = alert(&[("alertname", "HighCPU")]);
        let bad = Silence { id: "bad".into(), ..silence(vec![Matcher { name: "alertname".into(), value: "[".into(), kind: MatcherType::Regex }]) };
        let good = Silence { id: "good".into(), ..silence(vec![Matcher { name: "alertname".into(), value: "HighCPU".into(), kind: MatcherType::Equal }]) };
        let outcome = m.matches_any(&CancellationToken::new(), &a, &[bad, good]);
        assert_eq!(outcome.matched_ids, vec!["good".to_string()]);
    }

    #[test]
    fn matches_any_returns_partial_on_cancellation() {
        let m = new_matcher();
        let a = alert(&[("alertname", "HighCPU")]);
        let matching = silence(vec![Matcher { name: "alertname".into(), value: "HighCPU".into(), kind: MatcherType::Equal }]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = m.matches_any(&cancel, &a, std::slice::from_ref(&matching));
        assert!(outcome.matched_ids.is_empty());
        assert!(matches!(outcome.cancelled, Some(SentinelError::ContextCancelled)));
    }
}
