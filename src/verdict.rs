//! Outcome of one topic check, and extraction of that outcome from free-form
//! oracle output.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

/// Notifications fire only strictly above this confidence.
pub const NOTIFY_CONFIDENCE_THRESHOLD: f64 = 0.3;

pub const GATHER_EMPTY_SUMMARY: &str = "Could not gather any information";
pub const PARSE_FAILURE_SUMMARY: &str = "Could not parse response";
pub const MISSING_SUMMARY: &str = "No summary";

/// First brace-delimited object without nested braces.
static JSON_OBJECT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{[^{}]*\}").unwrap());

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verdict {
    pub topic_name: String,
    pub has_update: bool,
    pub summary: String,
    pub source_url: Option<String>,
    pub confidence: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum MalformedVerdict {
    #[error("no JSON object in oracle response")]
    NoObject,
    #[error("invalid JSON object in oracle response: {0}")]
    Json(#[from] serde_json::Error),
}

impl Verdict {
    /// Zero-confidence "nothing new" verdict carrying an explanatory summary.
    pub fn no_update(topic_name: &str, summary: impl Into<String>) -> Self {
        Self {
            topic_name: topic_name.to_string(),
            has_update: false,
            summary: summary.into(),
            source_url: None,
            confidence: 0.0,
        }
    }

    pub fn gather_empty(topic_name: &str) -> Self {
        Self::no_update(topic_name, GATHER_EMPTY_SUMMARY)
    }

    pub fn parse_failure(topic_name: &str) -> Self {
        Self::no_update(topic_name, PARSE_FAILURE_SUMMARY)
    }

    pub fn oracle_failure(topic_name: &str, cause: impl std::fmt::Display) -> Self {
        Self::no_update(topic_name, format!("Error checking topic: {cause}"))
    }

    pub fn should_notify(&self) -> bool {
        self.has_update && self.confidence > NOTIFY_CONFIDENCE_THRESHOLD
    }
}

/// Pull the verdict object out of `raw` and map its fields, applying defaults
/// for anything missing or of the wrong type.
pub fn parse_verdict(topic_name: &str, raw: &str) -> Result<Verdict, MalformedVerdict> {
    let m = JSON_OBJECT.find(raw).ok_or(MalformedVerdict::NoObject)?;
    let obj: serde_json::Map<String, Value> = serde_json::from_str(m.as_str())?;

    let has_update = obj
        .get("has_significant_update")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let summary = obj
        .get("summary")
        .and_then(Value::as_str)
        .unwrap_or(MISSING_SUMMARY)
        .to_string();
    let confidence = obj
        .get("confidence")
        .and_then(Value::as_f64)
        .map(|c| c.clamp(0.0, 1.0))
        .unwrap_or(0.0);
    let source_url = obj
        .get("source_url")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    Ok(Verdict {
        topic_name: topic_name.to_string(),
        has_update,
        summary,
        source_url,
        confidence,
    })
}
