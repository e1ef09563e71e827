//! Topic management: structured actions embedded in assistant replies, and the
//! config-file edits they translate to.

use anyhow::{bail, Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::format::{load_document, store_document};
use crate::topic::Topic;

static FENCED_JSON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ManagerAction {
    AddTopic { topic: Topic },
    RemoveTopic { name: String },
    ListTopics,
}

/// Find the action object in free text. A fenced ```json block wins; otherwise
/// the first balanced object starting with `{"action"` is used.
pub fn extract_action(text: &str) -> Option<ManagerAction> {
    if let Some(caps) = FENCED_JSON.captures(text) {
        if let Ok(action) = serde_json::from_str(&caps[1]) {
            return Some(action);
        }
    }

    let start = text
        .find(r#"{"action""#)
        .or_else(|| text.find(r#"{ "action""#))?;
    let end = balanced_end(&text[start..])?;
    serde_json::from_str(&text[start..start + end]).ok()
}

/// Byte length of the brace-balanced prefix of `s`, which starts at `{`.
fn balanced_end(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in s.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Added(Topic),
    AlreadyExists(String),
    Removed(String),
    NotFound(String),
    Listing(Vec<Topic>),
}

impl fmt::Display for ActionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionOutcome::Added(t) => {
                writeln!(f, "Added topic: {}", t.name)?;
                writeln!(f, "  Description: {}", t.description)?;
                if !t.search_queries.is_empty() {
                    writeln!(f, "  Search queries:")?;
                    for q in &t.search_queries {
                        writeln!(f, "    - {q}")?;
                    }
                }
                if !t.urls_to_check.is_empty() {
                    writeln!(f, "  URLs to check:")?;
                    for u in &t.urls_to_check {
                        writeln!(f, "    - {u}")?;
                    }
                }
                write!(f, "  Check interval: {} hours", t.check_interval_hours)
            }
            ActionOutcome::AlreadyExists(name) => write!(f, "Topic '{name}' already exists."),
            ActionOutcome::Removed(name) => write!(f, "Removed topic: {name}"),
            ActionOutcome::NotFound(name) => write!(f, "Topic not found: {name}"),
            ActionOutcome::Listing(topics) if topics.is_empty() => {
                write!(f, "No topics configured yet.")
            }
            ActionOutcome::Listing(topics) => {
                writeln!(f, "Current topics:")?;
                for (i, t) in topics.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "  - {} ({}h)", t.name, t.check_interval_hours)?;
                    if !t.description.is_empty() {
                        write!(f, "\n    {}", t.description)?;
                    }
                }
                Ok(())
            }
        }
    }
}

/// The config document, opened for editing its `topics` list. Every other key
/// is kept as-is on save.
#[derive(Debug)]
pub struct TopicBook {
    path: PathBuf,
    doc: Map<String, Value>,
}

impl TopicBook {
    /// A missing file opens as an empty document.
    pub fn open(path: &Path) -> Result<Self> {
        let doc = if path.exists() {
            match load_document::<Value>(path)? {
                Value::Object(map) => map,
                Value::Null => Map::new(),
                _ => bail!("{} is not a mapping", path.display()),
            }
        } else {
            Map::new()
        };
        Ok(Self {
            path: path.to_path_buf(),
            doc,
        })
    }

    fn entries(&self) -> &[Value] {
        self.doc
            .get("topics")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Edits the `topics` list in place. A missing or non-list value starts empty.
    fn edit_entries(&mut self, f: impl FnOnce(&mut Vec<Value>)) {
        let slot = self.doc.entry("topics").or_insert(Value::Null);
        let mut items = match slot.take() {
            Value::Array(items) => items,
            _ => Vec::new(),
        };
        f(&mut items);
        *slot = Value::Array(items);
    }

    /// Topics that deserialize; malformed entries are skipped with a warning.
    pub fn topics(&self) -> Vec<Topic> {
        self.entries()
            .iter()
            .filter_map(|v| match serde_json::from_value::<Topic>(v.clone()) {
                Ok(t) => Some(t),
                Err(e) => {
                    warn!(path = %self.path.display(), "skipping malformed topic entry: {e}");
                    None
                }
            })
            .collect()
    }

    fn position(&self, name: &str) -> Option<usize> {
        let needle = name.trim().to_lowercase();
        self.entries().iter().position(|v| {
            v.get("name")
                .and_then(Value::as_str)
                .is_some_and(|n| n.trim().to_lowercase() == needle)
        })
    }

    pub fn add(&mut self, topic: Topic) -> Result<ActionOutcome> {
        topic.validate()?;
        if self.position(&topic.name).is_some() {
            return Ok(ActionOutcome::AlreadyExists(topic.name));
        }
        let value = serde_json::to_value(&topic).context("encoding topic")?;
        self.edit_entries(|items| items.push(value));
        self.save()?;
        info!(topic = %topic.name, "topic added");
        Ok(ActionOutcome::Added(topic))
    }

    pub fn remove(&mut self, name: &str) -> Result<ActionOutcome> {
        let Some(idx) = self.position(name) else {
            return Ok(ActionOutcome::NotFound(name.to_string()));
        };
        self.edit_entries(|items| {
            items.remove(idx);
        });
        self.save()?;
        info!(topic = name, "topic removed");
        Ok(ActionOutcome::Removed(name.to_string()))
    }

    pub fn apply(&mut self, action: ManagerAction) -> Result<ActionOutcome> {
        match action {
            ManagerAction::AddTopic { topic } => self.add(topic),
            ManagerAction::RemoveTopic { name } => self.remove(&name),
            ManagerAction::ListTopics => Ok(ActionOutcome::Listing(self.topics())),
        }
    }

    fn save(&self) -> Result<()> {
        store_document(&self.path, &Value::Object(self.doc.clone()))
    }
}
