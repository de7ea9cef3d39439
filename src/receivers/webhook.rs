//! Generic webhook receiver adapter: a static URL plus a templated
//! `Fields` map. The URL is never a template source — it is a transport
//! address, not alert-derived content.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::template::{TemplateData, TemplateEngine};

use super::is_template_source;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub url: String,
    pub fields: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderedWebhook {
    pub url: String,
    pub fields: HashMap<String, String>,
}

pub async fn process_webhook_config(
    engine: &TemplateEngine,
    cancel: &CancellationToken,
    config: &WebhookConfig,
    data: &TemplateData,
) -> Result<RenderedWebhook> {
    let mut sources = HashMap::new();
    for (key, value) in &config.fields {
        if is_template_source(value) {
            sources.insert(key.clone(), value.clone());
        }
    }

    let (rendered, error) = engine.execute_multiple(cancel, &sources, data).await;
    if let Some(err) = error {
        return Err(err);
    }

    let fields = config
        .fields
        .iter()
        .map(|(key, value)| {
            let rendered_value = rendered.get(key).cloned().unwrap_or_else(|| value.clone());
            (key.clone(), rendered_value)
        })
        .collect();

    Ok(RenderedWebhook { url: config.url.clone(), fields })
}
