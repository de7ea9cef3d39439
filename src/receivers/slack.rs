//! Slack receiver adapter: `Title`, `Text`, `Pretext`, and a list of
//! `{Title, Value, Short}` fields, each subfield independently templated.

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::template::{TemplateData, TemplateEngine};

use super::is_template_source;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackField {
    pub title: String,
    pub value: String,
    pub short: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    pub title: String,
    pub text: String,
    pub pretext: String,
    pub fields: Vec<SlackField>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderedSlack {
    pub title: String,
    pub text: String,
    pub pretext: String,
    pub fields: Vec<SlackField>,
}

/// Render every templated field in `config` in one fan-out.
pub async fn process_slack_config(
    engine: &TemplateEngine,
    cancel: &CancellationToken,
    config: &SlackConfig,
    data: &TemplateData,
) -> Result<RenderedSlack> {
    let mut sources = std::collections::HashMap::new();
    collect(&mut sources, "title", &config.title);
    collect(&mut sources, "text", &config.text);
    collect(&mut sources, "pretext", &config.pretext);
    for (i, field) in config.fields.iter().enumerate() {
        collect(&mut sources, &format!("field.{i}.title"), &field.title);
        collect(&mut sources, &format!("field.{i}.value"), &field.value);
    }

    let (rendered, error) = engine.execute_multiple(cancel, &sources, data).await;
    if let Some(err) = error {
        return Err(err);
    }

    let resolve = |key: &str, original: &str| rendered.get(key).cloned().unwrap_or_else(|| original.to_string());

    Ok(RenderedSlack {
        title: resolve("title", &config.title),
        text: resolve("text", &config.text),
        pretext: resolve("pretext", &config.pretext),
        fields: config
            .fields
            .iter()
            .enumerate()
            .map(|(i, field)| SlackField {
                title: resolve(&format!("field.{i}.title"), &field.title),
                value: resolve(&format!("field.{i}.value"), &field.value),
                short: field.short,
            })
            .collect(),
    })
}

fn collect(sources: &mut std::collections::HashMap<String, String>, key: &str, value: &str) {
    if is_template_source(value) {
        sources.insert(key.to_string(), value.to_string());
    }
}
