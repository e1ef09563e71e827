use anyhow::{Context, Result};
use reqwest::Client;
use std::time::Duration;

use super::{Notifier, UpdateNotice};

pub struct SlackNotifier {
    webhook_url: String,
    client: Client,
    timeout: Duration,
}

impl SlackNotifier {
    pub fn new(url: String) -> Self {
        Self {
            webhook_url: url,
            client: Client::new(),
            timeout: Duration::from_secs(5),
        }
    }

    async fn post(&self, text: String) -> Result<()> {
        let body = serde_json::json!({ "text": text });
        self.client
            .post(&self.webhook_url)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .context("slack post")?
            .error_for_status()
            .context("slack non-2xx")?;
        Ok(())
    }
}

/// Slack mrkdwn rendering of a notice.
pub fn slack_text(notice: &UpdateNotice) -> String {
    let mut text = format!("*Update: {}*\n{}", notice.topic, notice.summary);
    if let Some(url) = &notice.source_url {
        text.push_str(&format!("\n<{url}>"));
    }
    text.push_str(&format!("\n@ {}", notice.ts.to_rfc3339()));
    text
}

#[async_trait::async_trait]
impl Notifier for SlackNotifier {
    async fn notify_update(&self, notice: &UpdateNotice) -> Result<()> {
        self.post(slack_text(notice)).await
    }

    fn name(&self) -> &'static str {
        "slack"
    }
}
