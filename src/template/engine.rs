//! [`TemplateEngine`]: parse-and-execute with an outer deadline, parallel
//! multi-field rendering, and fallback-on-error.
//!
//! Grounded on the teacher's preference for `Arc`-shared state plus
//! `tokio::select!` for cooperative cancellation (the same shape as the
//! retry executor's inter-attempt sleep), applied here to bound a single
//! render under both a deadline and an external cancellation token.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use futures::future::join_all;
use handlebars::Handlebars;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::{Result, SentinelError};

use super::cache::{TemplateCache, TemplateCacheStats};
use super::data::TemplateData;
use super::functions;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TemplateEngineConfig {
    pub cache_capacity: usize,
    pub render_timeout: Duration,
    /// When true, an execution failure returns the original source
    /// unchanged instead of a typed execute error.
    pub fallback_on_error: bool,
}

impl Default for TemplateEngineConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 1000,
            render_timeout: Duration::from_secs(5),
            fallback_on_error: true,
        }
    }
}

/// Sandboxed, cached text-template engine. The function registry is fixed
/// at construction; there is no filesystem, network, or reflection access
/// reachable from a template.
pub struct TemplateEngine {
    registry: Arc<RwLock<Handlebars<'static>>>,
    cache: TemplateCache,
    config: TemplateEngineConfig,
}

impl TemplateEngine {
    pub fn new(config: TemplateEngineConfig) -> Self {
        let mut hb = Handlebars::new();
        hb.set_strict_mode(false);
        // Go text/template performs no output escaping; these payloads
        // target Slack/PagerDuty/Email, not HTML.
        hb.register_escape_fn(handlebars::no_escape);
        functions::register_all(&mut hb);
        Self {
            registry: Arc::new(RwLock::new(hb)),
            cache: TemplateCache::new(config.cache_capacity),
            config,
        }
    }

    /// Render `source` against `data`. An empty source returns an empty
    /// string without touching the cache or the data's validation.
    pub async fn execute(&self, cancel: &CancellationToken, source: &str, data: &TemplateData) -> Result<String> {
        if source.is_empty() {
            return Ok(String::new());
        }
        data.validate()?;

        let lowered = super::pipeline::preprocess(source)?;
        let key = self.cache.get_or_compile(&self.registry, &lowered)?;

        let registry = Arc::clone(&self.registry);
        let data = data.clone();
        let source_owned = source.to_string();
        let render_task = tokio::task::spawn_blocking(move || {
            let registry = registry.read().unwrap_or_else(|p| p.into_inner());
            registry.render(&key, &data)
        });

        let started = Instant::now();
        tokio::select! {
            result = render_task => {
                let rendered = result.map_err(|e| SentinelError::template_execute(&source_owned, e.to_string()))?;
                match rendered {
                    Ok(s) => Ok(s),
                    Err(e) if self.config.fallback_on_error => {
                        tracing::warn!(error = %e, "template execution failed, falling back to raw source");
                        Ok(source_owned)
                    }
                    Err(e) => Err(SentinelError::template_execute(&source_owned, e.to_string())),
                }
            }
            _ = tokio::time::sleep(self.config.render_timeout) => {
                Err(SentinelError::template_timeout(&source_owned, started.elapsed().as_millis() as u64))
            }
            _ = cancel.cancelled() => {
                Err(SentinelError::ContextCancelled)
            }
        }
    }

    /// Render every entry in `sources` concurrently against the same
    /// `data`. The returned map always contains one entry per input key;
    /// a field that failed to render carries its own source as a
    /// fallback string. The returned error, if any, is the first failure
    /// observed (key iteration order is not guaranteed).
    pub async fn execute_multiple(
        &self,
        cancel: &CancellationToken,
        sources: &HashMap<String, String>,
        data: &TemplateData,
    ) -> (HashMap<String, String>, Option<SentinelError>) {
        if let Err(e) = data.validate() {
            let fallback = sources.clone();
            return (fallback, Some(e));
        }

        let futures = sources.iter().map(|(name, source)| {
            let name = name.clone();
            let source = source.clone();
            async move {
                let result = self.execute(cancel, &source, data).await;
                (name, source, result)
            }
        });

        let results = join_all(futures).await;

        let mut rendered = HashMap::with_capacity(results.len());
        let mut first_error = None;
        for (name, source, result) in results {
            match result {
                Ok(value) => {
                    rendered.insert(name, value);
                }
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some(match &e {
                            SentinelError::TemplateParse { source_excerpt, message } => SentinelError::TemplateParse {
                                source_excerpt: source_excerpt.clone(),
                                message: message.clone(),
                            },
                            SentinelError::TemplateExecute { source_excerpt, message } => SentinelError::TemplateExecute {
                                source_excerpt: source_excerpt.clone(),
                                message: message.clone(),
                            },
                            SentinelError::TemplateTimeout { source_excerpt, elapsed_ms } => SentinelError::TemplateTimeout {
                                source_excerpt: source_excerpt.clone(),
                                elapsed_ms: *elapsed_ms,
                            },
                            SentinelError::ContextCancelled => SentinelError::ContextCancelled,
                            other => SentinelError::Generic(other.to_string()),
                        });
                    }
                    rendered.insert(name, source);
                }
            }
        }

        (rendered, first_error)
    }

    /// Drop every cached parsed template, forcing the next `execute` for
    /// each source to re-parse.
    pub fn invalidate_cache(&self) {
        self.cache.invalidate(&self.registry);
    }

    pub fn cache_stats(&self) -> TemplateCacheStats {
        self.cache.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as Map;

    fn sample_data() -> TemplateData {
        TemplateData {
            status: crate::model::AlertStatus::Firing,
            labels: Map::from([
                ("alertname".to_string(), "HighCPU".to_string()),
                ("severity".to_string(), "critical".to_string()),
            ]),
            annotations: Map::new(),
            starts_at: chrono::Utc::now(),
            ends_at: None,
            value: None,
            group_labels: Map::new(),
            common_labels: Map::new(),
            common_annotations: Map::new(),
            group_key: "group-1".to_string(),
            external_url: "https://example.com".to_string(),
            silence_url: None,
            receiver: "default".to_string(),
            receiver_type: "slack".to_string(),
        }
    }

    #[tokio::test]
    async fn renders_dot_path_with_pipe() {
        let engine = TemplateEngine::new(TemplateEngineConfig::default());
        let out = engine
            .execute(&CancellationToken::new(), "{{ .Labels.alertname | toUpper }}", &sample_data())
            .await
            .unwrap();
        assert_eq!(out, "HIGHCPU");
    }

    #[tokio::test]
    async fn empty_source_renders_empty_string() {
        let engine = TemplateEngine::new(TemplateEngineConfig::default());
        let out = engine.execute(&CancellationToken::new(), "", &sample_data()).await.unwrap();
        assert_eq!(out, "");
    }

    #[tokio::test]
    async fn plain_text_round_trips_unchanged() {
        let engine = TemplateEngine::new(TemplateEngineConfig::default());
        let out = engine
            .execute(&CancellationToken::new(), "just plain text, no templating", &sample_data())
            .await
            .unwrap();
        assert_eq!(out, "just plain text, no templating");
    }

    #[tokio::test]
    async fn execute_multiple_renders_all_fields_concurrently() {
        let engine = TemplateEngine::new(TemplateEngineConfig::default());
        let mut sources = Map::new();
        sources.insert("title".to_string(), "{{ .Labels.alertname }}".to_string());
        sources.insert("text".to_string(), "Severity: {{ .Labels.severity }}".to_string());

        let (rendered, error) = engine.execute_multiple(&CancellationToken::new(), &sources, &sample_data()).await;
        assert!(error.is_none());
        assert_eq!(rendered.get("title").unwrap(), "HighCPU");
        assert_eq!(rendered.get("text").unwrap(), "Severity: critical");
        assert_eq!(engine.cache_stats().size, 2);
    }

    #[tokio::test]
    async fn parse_error_surfaces_as_first_error_with_partial_map() {
        let engine = TemplateEngine::new(TemplateEngineConfig::default());
        let mut sources = Map::new();
        sources.insert("good".to_string(), "{{ .Labels.alertname }}".to_string());
        sources.insert("bad".to_string(), "{{ .X | bogusFunc }}".to_string());

        let (rendered, error) = engine.execute_multiple(&CancellationToken::new(), &sources, &sample_data()).await;
        assert!(error.is_some());
        assert_eq!(rendered.get("good").unwrap(), "HighCPU");
        assert_eq!(rendered.get("bad").unwrap(), "{{ .X | bogusFunc }}");
    }

    #[tokio::test]
    async fn invalidate_cache_then_execute_matches_first_render() {
        let engine = TemplateEngine::new(TemplateEngineConfig::default());
        let cancel = CancellationToken::new();
        let source = "{{ .Labels.alertname | toLower }}";
        let first = engine.execute(&cancel, source, &sample_data()).await.unwrap();
        engine.invalidate_cache();
        let second = engine.execute(&cancel, source, &sample_data()).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn cancellation_short_circuits_execute() {
        let engine = TemplateEngine::new(TemplateEngineConfig::default());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = engine.execute(&cancel, "{{ .Labels.alertname }}", &sample_data()).await;
        assert!(matches!(result, Err(SentinelError::ContextCancelled)));
    }
}
