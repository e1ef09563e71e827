//! Poll loop: gate → due topics → sequential checks → notifications.
//!
//! Shutdown is observed between topic checks, never mid-check.

use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::AgentConfig;
use crate::engine::UpdateEngine;
use crate::gate::SystemGate;
use crate::notify::{NotifierMux, UpdateNotice};
use crate::scheduler::{due_topics, next_due_in, ScheduleState};
use crate::topic::Topic;
use crate::verdict::Verdict;

/// The subset of [`AgentConfig`] the loop needs.
#[derive(Debug, Clone)]
pub struct DaemonSettings {
    pub require_ac_power: bool,
    pub idle_threshold_minutes: u32,
    pub min_check_interval_minutes: u32,
    pub poll_interval: Duration,
    pub topics: Vec<Topic>,
}

impl From<&AgentConfig> for DaemonSettings {
    fn from(cfg: &AgentConfig) -> Self {
        Self {
            require_ac_power: cfg.require_ac_power,
            idle_threshold_minutes: cfg.idle_threshold_minutes,
            min_check_interval_minutes: cfg.min_check_interval_minutes,
            poll_interval: cfg.poll_interval,
            topics: cfg.topics.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub checked: usize,
    /// Updates at least one channel accepted.
    pub notified: usize,
}

pub struct Daemon {
    settings: DaemonSettings,
    engine: UpdateEngine,
    gate: SystemGate,
    notifier: NotifierMux,
    schedule: ScheduleState,
}

impl Daemon {
    pub fn new(
        settings: DaemonSettings,
        engine: UpdateEngine,
        gate: SystemGate,
        notifier: NotifierMux,
    ) -> Self {
        Self {
            settings,
            engine,
            gate,
            notifier,
            schedule: ScheduleState::new(),
        }
    }

    pub fn schedule(&self) -> &ScheduleState {
        &self.schedule
    }

    /// Sleep before the next poll: the poll interval, or less when a topic
    /// comes due sooner.
    pub fn next_wake(&self, now: DateTime<Utc>) -> Duration {
        let poll = self.settings.poll_interval;
        next_due_in(
            now,
            &self.settings.topics,
            &self.schedule,
            self.settings.min_check_interval_minutes,
        )
        .and_then(|d| d.to_std().ok())
        .map_or(poll, |d| d.min(poll))
    }

    /// Runs until `shutdown` is cancelled.
    pub async fn run(&mut self, shutdown: CancellationToken) {
        info!(
            topics = self.settings.topics.len(),
            poll_secs = self.settings.poll_interval.as_secs(),
            "watchdog started"
        );
        self.notifier.notify_started().await;

        while !shutdown.is_cancelled() {
            let gate = self
                .gate
                .permit(self.settings.require_ac_power, self.settings.idle_threshold_minutes)
                .await;
            if gate.allowed {
                let report = self.tick(Utc::now(), &shutdown).await;
                if report.checked > 0 {
                    info!(checked = report.checked, notified = report.notified, "tick done");
                }
            } else {
                debug!(reason = %gate.reason, "checks skipped");
                counter!("watchdog_gate_blocked_total").increment(1);
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.next_wake(Utc::now())) => {}
            }
        }
        info!("watchdog stopped");
    }

    /// Checks every topic due at `now`, in configuration order.
    pub async fn tick(&mut self, now: DateTime<Utc>, shutdown: &CancellationToken) -> TickReport {
        let due: Vec<Topic> = due_topics(
            now,
            &self.settings.topics,
            &self.schedule,
            self.settings.min_check_interval_minutes,
        )
        .into_iter()
        .cloned()
        .collect();

        let mut report = TickReport::default();
        for topic in &due {
            if shutdown.is_cancelled() {
                debug!("shutdown requested, leaving remaining topics for later");
                break;
            }
            info!(topic = %topic.name, "checking");
            let verdict = self.engine.check(topic).await;
            self.schedule.record_attempt(topic, now);
            report.checked += 1;

            if verdict.should_notify() {
                let delivered = self.notifier.notify_update(&UpdateNotice::from_verdict(&verdict)).await;
                if delivered > 0 {
                    report.notified += 1;
                } else if !self.notifier.is_empty() {
                    warn!(topic = %topic.name, "update found but no channel accepted it");
                }
            }
        }
        gauge!("watchdog_last_tick_ts").set(now.timestamp() as f64);
        report
    }
}

/// Manual run over `topics`, ignoring gate and schedule.
pub async fn check_topics(engine: &UpdateEngine, topics: &[Topic]) -> Vec<Verdict> {
    let mut out = Vec::with_capacity(topics.len());
    for topic in topics {
        out.push(engine.check(topic).await);
    }
    out
}

/// Cancels `token` on Ctrl-C or SIGTERM.
pub fn spawn_signal_listener(token: CancellationToken) {
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("shutdown signal received");
        token.cancel();
    });
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        Err(e) => {
            warn!("SIGTERM handler unavailable: {e}");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
