//! # Update engine
//! One topic check: gather → fingerprint → ask the oracle → parse → persist.
//!
//! Every path ends in a [`Verdict`]; nothing here returns an error to the caller.
//!
//! Cache policy per outcome:
//! - nothing gathered: cache untouched, zero-confidence verdict
//! - oracle failed: cache untouched, so the last good summary survives
//! - oracle answered (parseable or not): fingerprint + summary persisted
//!
//! The oracle is consulted even when the fingerprint matches the previous run;
//! deciding whether something is *new* is left to the oracle, which sees the
//! previous summary.

use chrono::Utc;
use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::cache::{fingerprint, FingerprintCache, TopicCacheEntry};
use crate::gather::{ContentGatherer, Fragment};
use crate::oracle::{DynOracle, OracleError};
use crate::topic::Topic;
use crate::verdict::{parse_verdict, Verdict};

pub const DEFAULT_ORACLE_TIMEOUT: Duration = Duration::from_secs(120);

pub struct UpdateEngine {
    gatherer: Arc<dyn ContentGatherer>,
    oracle: DynOracle,
    cache: FingerprintCache,
    oracle_timeout: Duration,
}

impl UpdateEngine {
    pub fn new(gatherer: Arc<dyn ContentGatherer>, oracle: DynOracle, cache: FingerprintCache) -> Self {
        Self {
            gatherer,
            oracle,
            cache,
            oracle_timeout: DEFAULT_ORACLE_TIMEOUT,
        }
    }

    pub fn with_oracle_timeout(mut self, timeout: Duration) -> Self {
        self.oracle_timeout = timeout;
        self
    }

    pub fn cache(&self) -> &FingerprintCache {
        &self.cache
    }

    pub async fn check(&self, topic: &Topic) -> Verdict {
        counter!("watchdog_checks_total").increment(1);

        let fragments = self.gatherer.gather(topic).await;
        if fragments.is_empty() {
            info!(topic = %topic.name, "nothing gathered");
            counter!("watchdog_gather_empty_total").increment(1);
            return Verdict::gather_empty(&topic.name);
        }

        let digest = fingerprint(&fragments);
        let prior = self.cache.load(&topic.name).await;
        let previous_summary = prior.as_ref().map(|p| p.last_summary.as_str()).unwrap_or("");
        if prior.as_ref().is_some_and(|p| p.content_fingerprint == digest) {
            debug!(topic = %topic.name, "content unchanged since last check");
        }

        let prompt = build_prompt(topic, previous_summary, &fragments);
        let raw = match self.ask(&prompt).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(topic = %topic.name, provider = self.oracle.provider_name(), "oracle call failed: {e}");
                counter!("watchdog_oracle_errors_total").increment(1);
                return Verdict::oracle_failure(&topic.name, e);
            }
        };

        let verdict = match parse_verdict(&topic.name, &raw) {
            Ok(v) => v,
            Err(e) => {
                warn!(topic = %topic.name, "unusable oracle response: {e}");
                counter!("watchdog_parse_failures_total").increment(1);
                Verdict::parse_failure(&topic.name)
            }
        };

        let entry = TopicCacheEntry {
            content_fingerprint: digest,
            last_summary: verdict.summary.clone(),
            last_checked_at: Some(Utc::now()),
        };
        if let Err(e) = self.cache.save(&topic.name, &entry).await {
            warn!(topic = %topic.name, "failed to persist cache entry: {e}");
        }

        if verdict.has_update {
            counter!("watchdog_updates_total").increment(1);
        }
        info!(
            topic = %topic.name,
            has_update = verdict.has_update,
            confidence = verdict.confidence,
            fragments = fragments.len(),
            "check finished"
        );
        verdict
    }

    async fn ask(&self, prompt: &str) -> Result<String, OracleError> {
        match tokio::time::timeout(self.oracle_timeout, self.oracle.ask(prompt)).await {
            Ok(res) => res,
            Err(_) => Err(OracleError::Timeout(self.oracle_timeout)),
        }
    }
}

/// Prompt handed to the oracle: topic metadata, previous summary, labelled
/// fragments, and the JSON answer contract.
pub fn build_prompt(topic: &Topic, previous_summary: &str, fragments: &[Fragment]) -> String {
    let gathered = fragments
        .iter()
        .map(Fragment::render)
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are monitoring a topic for updates. Analyze the gathered information and determine if there are any significant NEW updates or developments.

Topic: {name}
Description: {description}

Previous summary (if any): {previous_summary}

Gathered information:
{gathered}

Analyze this information and respond with a JSON object:
{{
    "has_significant_update": true/false,
    "summary": "Brief 1-2 sentence summary of any updates or current status",
    "confidence": 0.0-1.0,
    "source_url": "most relevant URL or null"
}}

Only set has_significant_update to true if there is genuinely NEW information that the user should know about. Don't report updates for things that haven't changed."#,
        name = topic.name,
        description = topic.description,
    )
}
