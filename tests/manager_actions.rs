// tests/manager_actions.rs
use std::fs;

use watchdog_agent::config::AgentConfig;
use watchdog_agent::manager::{extract_action, ActionOutcome, ManagerAction, TopicBook};
use watchdog_agent::topic::Topic;

const REPLY: &str = r#"Good idea! I'll monitor the Fedora 44 release for you.

```json
{"action": "add_topic", "topic": {"name": "Fedora 44 Release", "description": "Monitor for Fedora 44 release date and announcements", "search_queries": ["Fedora 44 release date", "Fedora 44 beta announcement"], "urls_to_check": ["https://fedoramagazine.org/"], "check_interval_hours": 48}}
```
"#;

fn no_env(_: &str) -> Option<String> {
    None
}

#[test]
fn assistant_reply_adds_topic_and_keeps_other_settings() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    fs::write(
        &path,
        "require_ac_power: false\nidle_threshold_minutes: 9\ntopics:\n  - name: Existing\n    check_interval_hours: 12\n",
    )
    .unwrap();

    let action = extract_action(REPLY).expect("action present");
    let mut book = TopicBook::open(&path).unwrap();
    let out = book.apply(action).unwrap();
    match &out {
        ActionOutcome::Added(t) => assert_eq!(t.check_interval_hours, 48),
        other => panic!("unexpected outcome {other:?}"),
    }
    assert!(out.to_string().starts_with("Added topic: Fedora 44 Release"));

    let cfg = AgentConfig::load_with_env(Some(&path), no_env);
    assert!(!cfg.require_ac_power);
    assert_eq!(cfg.idle_threshold_minutes, 9);
    let names: Vec<&str> = cfg.topics.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["Existing", "Fedora 44 Release"]);
    assert_eq!(cfg.topics[1].urls_to_check, vec!["https://fedoramagazine.org/"]);
}

#[test]
fn duplicate_names_are_rejected_case_insensitively() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    let mut book = TopicBook::open(&path).unwrap();

    book.add(Topic::new("Fedora", "")).unwrap();
    let out = book.add(Topic::new("FEDORA", "")).unwrap();
    assert_eq!(out, ActionOutcome::AlreadyExists("FEDORA".into()));
    assert_eq!(TopicBook::open(&path).unwrap().topics().len(), 1);
}

#[test]
fn remove_is_case_insensitive_and_reports_missing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    fs::write(
        &path,
        r#"{"oracle_provider": "mock", "topics": [{"name": "Alpha"}, {"name": "Beta"}]}"#,
    )
    .unwrap();

    let mut book = TopicBook::open(&path).unwrap();
    assert_eq!(
        book.apply(ManagerAction::RemoveTopic { name: "alpha".into() }).unwrap(),
        ActionOutcome::Removed("alpha".into())
    );
    assert_eq!(
        book.remove("Gamma").unwrap(),
        ActionOutcome::NotFound("Gamma".into())
    );

    let v: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(v["oracle_provider"], "mock");
    assert_eq!(v["topics"].as_array().unwrap().len(), 1);
    assert_eq!(v["topics"][0]["name"], "Beta");
}

#[test]
fn list_action_reads_current_topics() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        "min_check_interval_minutes = 45\n\n[[topics]]\nname = \"Kernel\"\ndescription = \"LTS releases\"\ncheck_interval_hours = 72\n",
    )
    .unwrap();

    let mut book = TopicBook::open(&path).unwrap();
    match book.apply(ManagerAction::ListTopics).unwrap() {
        ActionOutcome::Listing(topics) => {
            assert_eq!(topics.len(), 1);
            assert_eq!(topics[0].name, "Kernel");
            assert_eq!(topics[0].check_interval_hours, 72);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[test]
fn non_list_topics_value_is_replaced_on_add() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    fs::write(&path, "idle_threshold_minutes: 7\ntopics:\n  name: Not A List\n").unwrap();

    let mut book = TopicBook::open(&path).unwrap();
    assert!(book.topics().is_empty());
    let out = book.add(Topic::new("Fresh", "")).unwrap();
    assert_eq!(out, ActionOutcome::Added(Topic::new("Fresh", "")));

    let cfg = AgentConfig::load_with_env(Some(&path), no_env);
    assert_eq!(cfg.idle_threshold_minutes, 7);
    let names: Vec<&str> = cfg.topics.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["Fresh"]);
}

#[test]
fn invalid_topic_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let mut book = TopicBook::open(&dir.path().join("config.yaml")).unwrap();
    assert!(book.add(Topic::new("   ", "blank")).is_err());
    assert!(book.add(Topic::new("Zero", "").with_interval_hours(0)).is_err());
}
