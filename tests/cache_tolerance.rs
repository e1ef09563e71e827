// tests/cache_tolerance.rs
use chrono::{TimeZone, Utc};
use std::fs;

use watchdog_agent::cache::{FingerprintCache, TopicCacheEntry};

#[tokio::test]
async fn missing_and_corrupt_records_read_as_no_state() {
    let dir = tempfile::tempdir().unwrap();
    let cache = FingerprintCache::new(dir.path());
    assert!(cache.load("Never Seen").await.is_none());

    fs::write(cache.path_for("Broken"), "{ not json").unwrap();
    assert!(cache.load("Broken").await.is_none());

    // A corrupt record is simply replaced on the next save.
    let entry = TopicCacheEntry {
        content_fingerprint: "f".repeat(64),
        last_summary: "fresh".into(),
        last_checked_at: None,
    };
    cache.save("Broken", &entry).await.unwrap();
    assert_eq!(cache.load("Broken").await, Some(entry));
}

#[tokio::test]
async fn partial_and_legacy_records_are_accepted() {
    let dir = tempfile::tempdir().unwrap();
    let cache = FingerprintCache::new(dir.path());

    fs::write(cache.path_for("Partial"), r#"{"last_summary": "only this"}"#).unwrap();
    let e = cache.load("Partial").await.unwrap();
    assert_eq!(e.content_fingerprint, "");
    assert_eq!(e.last_summary, "only this");
    assert!(e.last_checked_at.is_none());

    // Naive local timestamps from older writers still parse.
    fs::write(
        cache.path_for("Legacy"),
        r#"{"content_hash": "abc", "last_checked": "2025-11-02T08:15:00.123456", "last_summary": "s"}"#,
    )
    .unwrap();
    let e = cache.load("Legacy").await.unwrap();
    assert_eq!(e.content_fingerprint, "abc");
    assert!(e.last_checked_at.is_some());
}

#[tokio::test]
async fn unknown_fields_survive_a_save() {
    let dir = tempfile::tempdir().unwrap();
    let cache = FingerprintCache::new(dir.path());
    let path = cache.path_for("Rust 2027");
    fs::write(
        &path,
        r#"{"content_hash": "old", "last_summary": "old", "pinned": true, "notes": ["a"]}"#,
    )
    .unwrap();

    let at = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
    cache
        .save(
            "Rust 2027",
            &TopicCacheEntry {
                content_fingerprint: "new".into(),
                last_summary: "new summary".into(),
                last_checked_at: Some(at),
            },
        )
        .await
        .unwrap();

    let v: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(v["content_hash"], "new");
    assert_eq!(v["last_summary"], "new summary");
    assert_eq!(v["pinned"], true);
    assert_eq!(v["notes"][0], "a");
    assert_eq!(
        cache.load("Rust 2027").await.unwrap().last_checked_at,
        Some(at)
    );
}

#[test]
fn file_names_are_sanitized() {
    let cache = FingerprintCache::new("/tmp/wd");
    let p = cache.path_for("HP ZBook: Battery/Limit");
    assert_eq!(p.file_name().unwrap(), "HP_ZBook__Battery_Limit.json");
}
