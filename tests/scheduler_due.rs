// tests/scheduler_due.rs
use chrono::{DateTime, Duration, TimeZone, Utc};

use watchdog_agent::scheduler::{due_topics, effective_interval, is_due, ScheduleState};
use watchdog_agent::topic::Topic;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 4, 12, 0, 0).unwrap()
}

fn checked_ago(topic: &Topic, minutes: i64) -> ScheduleState {
    let mut s = ScheduleState::new();
    s.record_attempt(topic, now() - Duration::minutes(minutes));
    s
}

#[test]
fn hourly_topic_with_half_hour_floor() {
    let t = Topic::new("Kernel", "").with_interval_hours(1);
    // The effective interval is max(1h, 30min) = 1h.
    assert_eq!(effective_interval(1, 30), Duration::hours(1));
    assert!(!is_due(now(), &t, &checked_ago(&t, 20), 30));
    assert!(!is_due(now(), &t, &checked_ago(&t, 31), 30));
    assert!(is_due(now(), &t, &checked_ago(&t, 60), 30));
    assert!(is_due(now(), &t, &checked_ago(&t, 61), 30));
}

#[test]
fn floor_dominates_short_topic_interval() {
    let t = Topic::new("Kernel", "").with_interval_hours(1);
    assert!(!is_due(now(), &t, &checked_ago(&t, 75), 90));
    assert!(is_due(now(), &t, &checked_ago(&t, 90), 90));
}

#[test]
fn due_topics_keep_configuration_order() {
    let topics = vec![
        Topic::new("C", "").with_interval_hours(1),
        Topic::new("A", "").with_interval_hours(24),
        Topic::new("B", "").with_interval_hours(1),
    ];
    let mut state = ScheduleState::new();
    state.record_attempt(&topics[1], now() - Duration::hours(2));

    let due: Vec<&str> = due_topics(now(), &topics, &state, 30)
        .into_iter()
        .map(|t| t.name.as_str())
        .collect();
    assert_eq!(due, vec!["C", "B"]);
}

#[test]
fn attempt_resets_the_clock_regardless_of_outcome() {
    let topics = vec![Topic::new("Flaky", "").with_interval_hours(2)];
    let mut state = ScheduleState::new();
    assert_eq!(due_topics(now(), &topics, &state, 30).len(), 1);

    state.record_attempt(&topics[0], now());
    assert!(due_topics(now() + Duration::minutes(1), &topics, &state, 30).is_empty());
    assert!(due_topics(now() + Duration::minutes(119), &topics, &state, 30).is_empty());
    assert_eq!(due_topics(now() + Duration::hours(2), &topics, &state, 30).len(), 1);
}
