//! Email receiver adapter: `Subject`, `Body` are templated; the recipient
//! list passes through unchanged.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::template::{TemplateData, TemplateEngine};

use super::is_template_source;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub subject: String,
    pub body: String,
    pub recipients: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderedEmail {
    pub subject: String,
    pub body: String,
    pub recipients: Vec<String>,
}

pub async fn process_email_config(
    engine: &TemplateEngine,
    cancel: &CancellationToken,
    config: &EmailConfig,
    data: &TemplateData,
) -> Result<RenderedEmail> {
    let mut sources = HashMap::new();
    if is_template_source(&config.subject) {
        sources.insert("subject".to_string(), config.subject.clone());
    }
    if is_template_source(&config.body) {
        sources.insert("body".to_string(), config.body.clone());
    }

    let (rendered, error) = engine.execute_multiple(cancel, &sources, data).await;
    if let Some(err) = error {
        return Err(err);
    }

    Ok(RenderedEmail {
        subject: rendered.get("subject").cloned().unwrap_or_else(|| config.subject.clone()),
        body: rendered.get("body").cloned().unwrap_or_else(|| config.body.clone()),
        recipients: config.recipients.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AlertStatus;
    use crate::template::TemplateEngineConfig;
    use std::collections::HashMap as Map;

    #[tokio::test]
    async fn recipients_pass_through_unchanged() {
        let engine = TemplateEngine::new(TemplateEngineConfig::default());
        let config = EmailConfig {
            subject: "{{ .Labels.alertname }} fired".to_string(),
            body: "static body, no templating".to_string(),
            recipients: vec!["oncall@example.com".to_string()],
        };
        let data = TemplateData {
            status: AlertStatus::Firing,
            labels: Map::from([("alertname".to_string(), "HighCPU".to_string())]),
            annotations: Map::new(),
            starts_at: chrono::Utc::now(),
            ends_at: None,
            value: None,
            group_labels: Map::new(),
            common_labels: Map::new(),
            common_annotations: Map::new(),
            group_key: "g".to_string(),
            external_url: "https://example.com".to_string(),
            silence_url: None,
            receiver: "email".to_string(),
            receiver_type: "email".to_string(),
        };
        let rendered = process_email_config(&engine, &CancellationToken::new(), &config, &data).await.unwrap();
        assert_eq!(rendered.subject, "HighCPU fired");
        assert_eq!(rendered.body, "static body, no templating");
        assert_eq!(rendered.recipients, vec!["oncall@example.com".to_string()]);
    }
}
