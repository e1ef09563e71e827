// src/notify/desktop.rs
use anyhow::{anyhow, bail, Context, Result};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use super::{Notifier, UpdateNotice};

const APP_NAME: &str = "Watchdog Agent";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Urgency {
    Low,
    Normal,
}

impl Urgency {
    fn as_str(self) -> &'static str {
        match self {
            Urgency::Low => "low",
            Urgency::Normal => "normal",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub urgency: Urgency,
    pub icon: &'static str,
    pub expire: Duration,
}

impl Notification {
    /// `notify-send` argument list.
    pub fn args(&self) -> Vec<String> {
        vec![
            "--app-name".into(),
            APP_NAME.into(),
            "--urgency".into(),
            self.urgency.as_str().into(),
            "--icon".into(),
            self.icon.into(),
            "--expire-time".into(),
            self.expire.as_millis().to_string(),
            self.title.clone(),
            self.body.clone(),
        ]
    }
}

/// freedesktop notifications through `notify-send`.
#[derive(Clone)]
pub struct DesktopNotifier {
    program: String,
    timeout: Duration,
}

impl Default for DesktopNotifier {
    fn default() -> Self {
        Self {
            program: "notify-send".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

impl DesktopNotifier {
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub async fn send(&self, n: &Notification) -> Result<()> {
        let run = Command::new(&self.program)
            .args(n.args())
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();
        let out = tokio::time::timeout(self.timeout, run)
            .await
            .map_err(|_| anyhow!("{} timed out", self.program))?
            .with_context(|| format!("spawn {}", self.program))?;
        if !out.status.success() {
            bail!(
                "{} exited with {}: {}",
                self.program,
                out.status,
                String::from_utf8_lossy(&out.stderr).trim()
            );
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Notifier for DesktopNotifier {
    async fn notify_update(&self, notice: &UpdateNotice) -> Result<()> {
        self.send(&Notification {
            title: notice.title(),
            body: notice.body(),
            urgency: Urgency::Normal,
            icon: "dialog-information",
            expire: Duration::from_secs(15),
        })
        .await
    }

    async fn notify_started(&self) -> Result<()> {
        self.send(&Notification {
            title: APP_NAME.to_string(),
            body: "Monitoring started".to_string(),
            urgency: Urgency::Low,
            icon: "dialog-information",
            expire: Duration::from_secs(3),
        })
        .await
    }

    fn name(&self) -> &'static str {
        "desktop"
    }
}
