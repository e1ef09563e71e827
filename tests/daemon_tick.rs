// tests/daemon_tick.rs
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use watchdog_agent::cache::FingerprintCache;
use watchdog_agent::daemon::{check_topics, Daemon, DaemonSettings};
use watchdog_agent::gate::{IdleProbe, PowerProbe, Signal, SystemGate};
use watchdog_agent::gather::{ContentGatherer, Fragment};
use watchdog_agent::notify::{Notifier, NotifierMux, UpdateNotice};
use watchdog_agent::oracle::MockOracle;
use watchdog_agent::topic::Topic;
use watchdog_agent::UpdateEngine;

struct StaticGatherer;

#[async_trait::async_trait]
impl ContentGatherer for StaticGatherer {
    async fn gather(&self, topic: &Topic) -> Vec<Fragment> {
        vec![Fragment::page("https://example.org", &format!("news about {}", topic.name))]
    }
}

struct OnAc;

impl PowerProbe for OnAc {
    fn on_ac_power(&self) -> Signal<bool> {
        Signal::Available(true)
    }
}

struct NoIdle;

#[async_trait::async_trait]
impl IdleProbe for NoIdle {
    async fn idle_time(&self) -> Signal<Duration> {
        Signal::Unavailable
    }
}

#[derive(Clone, Default)]
struct Recorder {
    updates: Arc<Mutex<Vec<UpdateNotice>>>,
    started: Arc<Mutex<usize>>,
}

#[async_trait::async_trait]
impl Notifier for Recorder {
    async fn notify_update(&self, notice: &UpdateNotice) -> anyhow::Result<()> {
        self.updates.lock().unwrap().push(notice.clone());
        Ok(())
    }

    async fn notify_started(&self) -> anyhow::Result<()> {
        *self.started.lock().unwrap() += 1;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recorder"
    }
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 1, 8, 0, 0).unwrap()
}

fn reply(confidence: f64) -> String {
    format!(
        r#"{{"has_significant_update": true, "summary": "something changed", "confidence": {confidence}, "source_url": null}}"#
    )
}

fn settings() -> DaemonSettings {
    DaemonSettings {
        require_ac_power: true,
        idle_threshold_minutes: 5,
        min_check_interval_minutes: 30,
        poll_interval: Duration::from_secs(3600),
        topics: vec![
            Topic::new("Alpha", "").with_interval_hours(24),
            Topic::new("Beta", "").with_interval_hours(1),
        ],
    }
}

fn daemon(dir: &std::path::Path, confidence: f64, rec: &Recorder) -> Daemon {
    let engine = UpdateEngine::new(
        Arc::new(StaticGatherer),
        Arc::new(MockOracle::replying(reply(confidence))),
        FingerprintCache::new(dir),
    );
    let gate = SystemGate::new(Box::new(OnAc), Box::new(NoIdle));
    let mux = NotifierMux::default().with_channel(Box::new(rec.clone()));
    Daemon::new(settings(), engine, gate, mux)
}

#[tokio::test]
async fn tick_checks_due_topics_and_notifies_confident_updates() {
    let dir = tempfile::tempdir().unwrap();
    let rec = Recorder::default();
    let mut d = daemon(dir.path(), 0.8, &rec);
    let token = CancellationToken::new();

    let r = d.tick(t0(), &token).await;
    assert_eq!((r.checked, r.notified), (2, 2));
    let topics: Vec<String> = rec.updates.lock().unwrap().iter().map(|n| n.topic.clone()).collect();
    assert_eq!(topics, vec!["Alpha", "Beta"]);

    // Nothing is due right after.
    let r = d.tick(t0() + ChronoDuration::minutes(10), &token).await;
    assert_eq!(r.checked, 0);

    // Only the hourly topic comes back first.
    let r = d.tick(t0() + ChronoDuration::hours(1), &token).await;
    assert_eq!(r.checked, 1);
    assert_eq!(rec.updates.lock().unwrap().last().unwrap().topic, "Beta");
}

#[tokio::test]
async fn threshold_confidence_is_not_enough() {
    let dir = tempfile::tempdir().unwrap();
    let rec = Recorder::default();
    let mut d = daemon(dir.path(), 0.3, &rec);

    let r = d.tick(t0(), &CancellationToken::new()).await;
    assert_eq!((r.checked, r.notified), (2, 0));
    assert!(rec.updates.lock().unwrap().is_empty());

    let dir = tempfile::tempdir().unwrap();
    let mut d = daemon(dir.path(), 0.31, &rec);
    let r = d.tick(t0(), &CancellationToken::new()).await;
    assert_eq!(r.notified, 2);
}

struct Refusing;

#[async_trait::async_trait]
impl Notifier for Refusing {
    async fn notify_update(&self, _: &UpdateNotice) -> anyhow::Result<()> {
        anyhow::bail!("webhook down")
    }

    fn name(&self) -> &'static str {
        "refusing"
    }
}

#[tokio::test]
async fn undelivered_updates_are_not_counted_as_notified() {
    let dir = tempfile::tempdir().unwrap();
    let engine = UpdateEngine::new(
        Arc::new(StaticGatherer),
        Arc::new(MockOracle::replying(reply(0.9))),
        FingerprintCache::new(dir.path()),
    );
    let gate = SystemGate::new(Box::new(OnAc), Box::new(NoIdle));
    let mux = NotifierMux::default().with_channel(Box::new(Refusing));
    let mut d = Daemon::new(settings(), engine, gate, mux);

    let r = d.tick(t0(), &CancellationToken::new()).await;
    assert_eq!((r.checked, r.notified), (2, 0));
    // The attempt still counts for scheduling.
    assert_eq!(d.schedule().len(), 2);
}

#[tokio::test]
async fn one_accepting_channel_is_enough() {
    let dir = tempfile::tempdir().unwrap();
    let rec = Recorder::default();
    let engine = UpdateEngine::new(
        Arc::new(StaticGatherer),
        Arc::new(MockOracle::replying(reply(0.9))),
        FingerprintCache::new(dir.path()),
    );
    let gate = SystemGate::new(Box::new(OnAc), Box::new(NoIdle));
    let mux = NotifierMux::default()
        .with_channel(Box::new(Refusing))
        .with_channel(Box::new(rec.clone()));
    let mut d = Daemon::new(settings(), engine, gate, mux);

    let r = d.tick(t0(), &CancellationToken::new()).await;
    assert_eq!(r.notified, 2);
    assert_eq!(rec.updates.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn cancelled_token_stops_before_next_topic() {
    let dir = tempfile::tempdir().unwrap();
    let rec = Recorder::default();
    let mut d = daemon(dir.path(), 0.8, &rec);
    let token = CancellationToken::new();
    token.cancel();

    let r = d.tick(t0(), &token).await;
    assert_eq!(r.checked, 0);
    assert!(d.schedule().is_empty());
}

#[tokio::test]
async fn wake_comes_early_when_a_topic_is_due_before_the_next_poll() {
    let dir = tempfile::tempdir().unwrap();
    let rec = Recorder::default();
    let mut d = daemon(dir.path(), 0.8, &rec);

    // Nothing checked yet: the poll interval applies.
    assert_eq!(d.next_wake(t0()), Duration::from_secs(3600));

    d.tick(t0(), &CancellationToken::new()).await;
    assert_eq!(d.next_wake(t0()), Duration::from_secs(3600));
    assert_eq!(
        d.next_wake(t0() + ChronoDuration::minutes(50)),
        Duration::from_secs(10 * 60)
    );
}

#[tokio::test]
async fn run_announces_start_and_exits_on_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let rec = Recorder::default();
    let mut d = daemon(dir.path(), 0.8, &rec);
    let token = CancellationToken::new();

    let stopper = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        stopper.cancel();
    });

    tokio::time::timeout(Duration::from_secs(5), d.run(token))
        .await
        .expect("loop must observe shutdown while sleeping");
    assert_eq!(*rec.started.lock().unwrap(), 1);
}

#[tokio::test]
async fn manual_check_ignores_schedule() {
    let dir = tempfile::tempdir().unwrap();
    let engine = UpdateEngine::new(
        Arc::new(StaticGatherer),
        Arc::new(MockOracle::quiet()),
        FingerprintCache::new(dir.path()),
    );
    let topics = settings().topics;
    let first = check_topics(&engine, &topics).await;
    let second = check_topics(&engine, &topics).await;
    assert_eq!(first.len(), 2);
    assert_eq!(second.len(), 2);
    assert!(first.iter().all(|v| !v.should_notify()));
}
