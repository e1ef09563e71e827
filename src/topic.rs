//! Monitoring targets.
//!
//! A [`Topic`] is owned by the configuration file; the pipeline only reads it.
//! Identity is the name, compared case-insensitively.

use serde::{Deserialize, Serialize};

pub const DEFAULT_CHECK_INTERVAL_HOURS: u32 = 24;

fn default_check_interval_hours() -> u32 {
    DEFAULT_CHECK_INTERVAL_HOURS
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub search_queries: Vec<String>,
    #[serde(default)]
    pub urls_to_check: Vec<String>,
    #[serde(default = "default_check_interval_hours")]
    pub check_interval_hours: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TopicError {
    #[error("topic name must not be empty")]
    EmptyName,
    #[error("topic '{0}': check_interval_hours must be positive")]
    ZeroInterval(String),
}

impl Topic {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            search_queries: Vec::new(),
            urls_to_check: Vec::new(),
            check_interval_hours: DEFAULT_CHECK_INTERVAL_HOURS,
        }
    }

    pub fn with_queries<I, S>(mut self, queries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.search_queries = queries.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_urls<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.urls_to_check = urls.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_interval_hours(mut self, hours: u32) -> Self {
        self.check_interval_hours = hours;
        self
    }

    /// Normalized identity used for schedule bookkeeping.
    pub fn key(&self) -> String {
        self.name.trim().to_lowercase()
    }

    pub fn matches_name(&self, name: &str) -> bool {
        self.key() == name.trim().to_lowercase()
    }

    pub fn validate(&self) -> Result<(), TopicError> {
        if self.name.trim().is_empty() {
            return Err(TopicError::EmptyName);
        }
        if self.check_interval_hours == 0 {
            return Err(TopicError::ZeroInterval(self.name.clone()));
        }
        Ok(())
    }
}

pub fn find_topic<'a>(topics: &'a [Topic], name: &str) -> Option<&'a Topic> {
    topics.iter().find(|t| t.matches_name(name))
}

/// Closest configured name for "did you mean" hints. Returns `None` when nothing
/// is reasonably similar.
pub fn closest_name<'a>(topics: &'a [Topic], name: &str) -> Option<&'a str> {
    let needle = name.trim().to_lowercase();
    topics
        .iter()
        .map(|t| (t, strsim::jaro_winkler(&t.key(), &needle)))
        .filter(|(_, score)| *score >= 0.75)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(t, _)| t.name.as_str())
}
