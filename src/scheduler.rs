// src/scheduler.rs
//! Per-topic due-ness with a global floor. State lives in memory only; a restart
//! forgets recency and topics may be checked right away.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashMap;

use crate::topic::Topic;

/// `max(topic interval, global floor)`.
pub fn effective_interval(check_interval_hours: u32, min_interval_minutes: u32) -> ChronoDuration {
    let topic = ChronoDuration::hours(i64::from(check_interval_hours));
    let floor = ChronoDuration::minutes(i64::from(min_interval_minutes));
    topic.max(floor)
}

/// Last attempt per topic (keyed by normalized name).
#[derive(Debug, Clone, Default)]
pub struct ScheduleState {
    last_checks: HashMap<String, DateTime<Utc>>,
}

impl ScheduleState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_check(&self, topic: &Topic) -> Option<DateTime<Utc>> {
        self.last_checks.get(&topic.key()).copied()
    }

    /// Called after every attempt, whatever its outcome.
    pub fn record_attempt(&mut self, topic: &Topic, at: DateTime<Utc>) {
        self.last_checks.insert(topic.key(), at);
    }

    pub fn len(&self) -> usize {
        self.last_checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_checks.is_empty()
    }
}

pub fn is_due(now: DateTime<Utc>, topic: &Topic, state: &ScheduleState, min_interval_minutes: u32) -> bool {
    match state.last_check(topic) {
        None => true,
        Some(last) => {
            now.signed_duration_since(last)
                >= effective_interval(topic.check_interval_hours, min_interval_minutes)
        }
    }
}

/// Topics due at `now`, in configuration order.
pub fn due_topics<'a>(
    now: DateTime<Utc>,
    topics: &'a [Topic],
    state: &ScheduleState,
    min_interval_minutes: u32,
) -> Vec<&'a Topic> {
    topics
        .iter()
        .filter(|t| is_due(now, t, state, min_interval_minutes))
        .collect()
}

/// Time until the next topic becomes due; `None` when something is due already
/// or there are no topics.
pub fn next_due_in(
    now: DateTime<Utc>,
    topics: &[Topic],
    state: &ScheduleState,
    min_interval_minutes: u32,
) -> Option<ChronoDuration> {
    topics
        .iter()
        .map(|t| match state.last_check(t) {
            None => ChronoDuration::zero(),
            Some(last) => {
                let due_at = last + effective_interval(t.check_interval_hours, min_interval_minutes);
                (due_at - now).max(ChronoDuration::zero())
            }
        })
        .min()
        .filter(|d| *d > ChronoDuration::zero())
}
