//! Per-topic persisted state: last content fingerprint, last summary, last check time.
//!
//! One JSON file per topic. Reads are forgiving: a missing, unreadable or corrupt
//! record is simply "no prior state". Writes go through a temp file + rename so a
//! crash never leaves a half-written record behind.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io;
use std::path::PathBuf;
use tokio::fs;
use tracing::debug;

use crate::gather::Fragment;

#[derive(Debug, Clone, PartialEq)]
pub struct TopicCacheEntry {
    pub content_fingerprint: String,
    pub last_summary: String,
    pub last_checked_at: Option<DateTime<Utc>>,
}

/// On-disk shape. Unknown keys ride along in `extra` and are written back untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CacheRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_checked: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_summary: Option<String>,
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

impl From<CacheRecord> for TopicCacheEntry {
    fn from(r: CacheRecord) -> Self {
        Self {
            content_fingerprint: r.content_hash.unwrap_or_default(),
            last_summary: r.last_summary.unwrap_or_default(),
            last_checked_at: r.last_checked.as_deref().and_then(parse_timestamp),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FingerprintCache {
    dir: PathBuf,
}

impl FingerprintCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `<dir>/<name with non-alphanumerics replaced by '_'>.json`
    pub fn path_for(&self, topic_name: &str) -> PathBuf {
        let safe: String = topic_name
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { '_' })
            .collect();
        self.dir.join(format!("{safe}.json"))
    }

    pub async fn load(&self, topic_name: &str) -> Option<TopicCacheEntry> {
        self.read_record(topic_name).await.map(Into::into)
    }

    /// Persist `entry`, keeping any foreign keys already present in the record.
    pub async fn save(&self, topic_name: &str, entry: &TopicCacheEntry) -> io::Result<()> {
        let mut record = self.read_record(topic_name).await.unwrap_or_default();
        record.content_hash = Some(entry.content_fingerprint.clone());
        record.last_summary = Some(entry.last_summary.clone());
        record.last_checked = entry.last_checked_at.map(|ts| ts.to_rfc3339());

        let json = serde_json::to_vec_pretty(&record)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(topic_name);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn read_record(&self, topic_name: &str) -> Option<CacheRecord> {
        let path = self.path_for(topic_name);
        let raw = match fs::read_to_string(&path).await {
            Ok(s) => s,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                debug!(path = %path.display(), "cache unreadable, ignoring: {e}");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(r) => Some(r),
            Err(e) => {
                debug!(path = %path.display(), "cache corrupt, ignoring: {e}");
                None
            }
        }
    }
}

/// SHA-256 (hex) over the rendered fragments joined by newlines, in gathered order.
pub fn fingerprint(fragments: &[Fragment]) -> String {
    let joined = fragments
        .iter()
        .map(Fragment::render)
        .collect::<Vec<_>>()
        .join("\n");
    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// RFC 3339, or a naive ISO-8601 local timestamp as older records carry.
fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_are_sanitized() {
        let c = FingerprintCache::new("/tmp/x");
        assert_eq!(
            c.path_for("HP ZBook: G1a/Linux"),
            PathBuf::from("/tmp/x/HP_ZBook__G1a_Linux.json")
        );
    }

    #[test]
    fn fingerprint_is_stable_and_order_sensitive() {
        let a = Fragment::page("https://a", "one");
        let b = Fragment::page("https://b", "two");
        let f1 = fingerprint(&[a.clone(), b.clone()]);
        let f2 = fingerprint(&[a.clone(), b.clone()]);
        let f3 = fingerprint(&[b, a]);
        assert_eq!(f1, f2);
        assert_ne!(f1, f3);
        assert_eq!(f1.len(), 64);
        assert!(f1.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn timestamps_accept_rfc3339_and_naive_iso() {
        let rfc = parse_timestamp("2026-03-01T10:00:00+00:00").unwrap();
        assert_eq!(rfc.to_rfc3339(), "2026-03-01T10:00:00+00:00");
        assert!(parse_timestamp("2026-03-01T10:00:00.123456").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }
}
