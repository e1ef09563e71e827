// src/notify/mod.rs
pub mod desktop;
pub mod discord;
pub mod slack;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::verdict::Verdict;

pub use desktop::DesktopNotifier;
pub use discord::DiscordNotifier;
pub use slack::SlackNotifier;

/// What a channel receives when a topic has news.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateNotice {
    pub topic: String,
    pub summary: String,
    pub source_url: Option<String>,
    pub ts: DateTime<Utc>,
}

impl UpdateNotice {
    pub fn new(topic: &str, summary: &str, source_url: Option<&str>) -> Self {
        Self {
            topic: topic.to_string(),
            summary: summary.to_string(),
            source_url: source_url.map(str::to_string),
            ts: Utc::now(),
        }
    }

    pub fn from_verdict(v: &Verdict) -> Self {
        Self::new(&v.topic_name, &v.summary, v.source_url.as_deref())
    }

    pub fn title(&self) -> String {
        format!("Update: {}", self.topic)
    }

    /// Summary, followed by the source URL on its own paragraph when present.
    pub fn body(&self) -> String {
        match &self.source_url {
            Some(url) => format!("{}\n\n{}", self.summary, url),
            None => self.summary.clone(),
        }
    }
}

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_update(&self, notice: &UpdateNotice) -> Result<()>;

    /// Daemon start announcement; channels may ignore it.
    async fn notify_started(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &'static str;
}

/// Fans notices out to every configured channel. A failing channel is logged
/// and does not affect the others.
#[derive(Default)]
pub struct NotifierMux {
    channels: Vec<Box<dyn Notifier>>,
}

impl NotifierMux {
    pub fn new(channels: Vec<Box<dyn Notifier>>) -> Self {
        Self { channels }
    }

    /// Desktop (unless `WATCHDOG_DESKTOP_NOTIFY=0`), plus Slack/Discord when
    /// their webhook env vars are set.
    pub fn from_env() -> Self {
        let mut channels: Vec<Box<dyn Notifier>> = Vec::new();
        let desktop_off = std::env::var("WATCHDOG_DESKTOP_NOTIFY").is_ok_and(|v| v == "0");
        if !desktop_off {
            channels.push(Box::new(DesktopNotifier::default()));
        }
        if let Ok(url) = std::env::var("SLACK_WEBHOOK_URL") {
            channels.push(Box::new(SlackNotifier::new(url)));
        }
        if let Ok(url) = std::env::var("DISCORD_WEBHOOK_URL") {
            channels.push(Box::new(DiscordNotifier::new(url)));
        }
        Self { channels }
    }

    pub fn with_channel(mut self, ch: Box<dyn Notifier>) -> Self {
        self.channels.push(ch);
        self
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Returns how many channels accepted the notice.
    pub async fn notify_update(&self, notice: &UpdateNotice) -> usize {
        let mut delivered = 0;
        for ch in &self.channels {
            match ch.notify_update(notice).await {
                Ok(()) => {
                    debug!(channel = ch.name(), topic = %notice.topic, "notified");
                    delivered += 1;
                }
                Err(e) => warn!(channel = ch.name(), topic = %notice.topic, "notify failed: {e:#}"),
            }
        }
        delivered
    }

    pub async fn notify_started(&self) {
        for ch in &self.channels {
            if let Err(e) = ch.notify_started().await {
                warn!(channel = ch.name(), "start notice failed: {e:#}");
            }
        }
    }
}
