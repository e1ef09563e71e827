// src/config/agent.rs
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use super::format::load_document;
use crate::topic::{Topic, DEFAULT_CHECK_INTERVAL_HOURS};

/// Which judgment backend answers the update prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OracleProvider {
    #[default]
    #[serde(alias = "claude")]
    Anthropic,
    OpenAi,
    /// Deterministic offline oracle; never reports updates.
    Mock,
}

impl OracleProvider {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anthropic" | "claude" => Some(Self::Anthropic),
            "openai" => Some(Self::OpenAi),
            "mock" => Some(Self::Mock),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct RawConfig {
    anthropic_api_key: Option<String>,
    openai_api_key: Option<String>,
    oracle_provider: Option<OracleProvider>,
    oracle_model: Option<String>,
    oracle_daily_limit: Option<u32>,
    require_ac_power: Option<bool>,
    idle_threshold_minutes: Option<u32>,
    default_check_interval_hours: Option<u32>,
    min_check_interval_minutes: Option<u32>,
    poll_interval_secs: Option<u64>,
    http_timeout_secs: Option<u64>,
    oracle_timeout_secs: Option<u64>,
    cache_dir: Option<PathBuf>,
    metrics_listen: Option<SocketAddr>,
    /// Decoded one by one so a bad entry only costs itself.
    topics: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawTopic {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    search_queries: Vec<String>,
    #[serde(default)]
    urls_to_check: Vec<String>,
    #[serde(default)]
    check_interval_hours: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub anthropic_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub oracle_provider: OracleProvider,
    /// Provider default when `None`.
    pub oracle_model: Option<String>,
    pub oracle_daily_limit: Option<u32>,

    pub require_ac_power: bool,
    pub idle_threshold_minutes: u32,
    pub default_check_interval_hours: u32,
    /// Floor applied to every topic's interval.
    pub min_check_interval_minutes: u32,
    pub poll_interval: Duration,
    pub http_timeout: Duration,
    pub oracle_timeout: Duration,

    pub topics: Vec<Topic>,

    pub config_path: PathBuf,
    pub cache_dir: PathBuf,
    pub metrics_listen: Option<SocketAddr>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            anthropic_api_key: None,
            openai_api_key: None,
            oracle_provider: OracleProvider::default(),
            oracle_model: None,
            oracle_daily_limit: None,
            require_ac_power: true,
            idle_threshold_minutes: 5,
            default_check_interval_hours: DEFAULT_CHECK_INTERVAL_HOURS,
            min_check_interval_minutes: 30,
            poll_interval: Duration::from_secs(60),
            http_timeout: Duration::from_secs(30),
            oracle_timeout: Duration::from_secs(120),
            topics: Vec::new(),
            config_path: super::default_config_path(),
            cache_dir: super::default_cache_dir(),
            metrics_listen: None,
        }
    }
}

impl AgentConfig {
    /// Load from `path` (or the default location) and apply process env overrides.
    ///
    /// A missing file yields defaults. An unreadable or invalid file is logged and
    /// also yields defaults, so `status`/`init` keep working with a broken config.
    pub fn load(path: Option<&Path>) -> Self {
        Self::load_with_env(path, |key| std::env::var(key).ok())
    }

    /// Same as [`AgentConfig::load`], with an injectable env lookup.
    pub fn load_with_env<F>(path: Option<&Path>, env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(p) = path {
            cfg.config_path = p.to_path_buf();
        }

        if cfg.config_path.exists() {
            match load_document::<RawConfig>(&cfg.config_path) {
                Ok(raw) => cfg.apply_raw(raw),
                Err(e) => warn!(
                    path = %cfg.config_path.display(),
                    "failed to load config, using defaults: {e:#}"
                ),
            }
        }

        cfg.apply_env(env);
        cfg
    }

    fn apply_raw(&mut self, raw: RawConfig) {
        if let Some(v) = raw.anthropic_api_key {
            self.anthropic_api_key = Some(v);
        }
        if let Some(v) = raw.openai_api_key {
            self.openai_api_key = Some(v);
        }
        if let Some(v) = raw.oracle_provider {
            self.oracle_provider = v;
        }
        self.oracle_model = raw.oracle_model.filter(|m| !m.trim().is_empty());
        self.oracle_daily_limit = raw.oracle_daily_limit;
        if let Some(v) = raw.require_ac_power {
            self.require_ac_power = v;
        }
        if let Some(v) = raw.idle_threshold_minutes {
            self.idle_threshold_minutes = v;
        }
        if let Some(v) = raw.default_check_interval_hours.filter(|h| *h > 0) {
            self.default_check_interval_hours = v;
        }
        if let Some(v) = raw.min_check_interval_minutes {
            self.min_check_interval_minutes = v;
        }
        if let Some(v) = raw.poll_interval_secs.filter(|s| *s > 0) {
            self.poll_interval = Duration::from_secs(v);
        }
        if let Some(v) = raw.http_timeout_secs.filter(|s| *s > 0) {
            self.http_timeout = Duration::from_secs(v);
        }
        if let Some(v) = raw.oracle_timeout_secs.filter(|s| *s > 0) {
            self.oracle_timeout = Duration::from_secs(v);
        }
        if let Some(v) = raw.cache_dir {
            self.cache_dir = v;
        }
        self.metrics_listen = raw.metrics_listen;

        for (idx, entry) in raw.topics.into_iter().enumerate() {
            let rt: RawTopic = match serde_json::from_value(entry) {
                Ok(rt) => rt,
                Err(e) => {
                    warn!("skipping malformed topic entry #{}: {e}", idx + 1);
                    continue;
                }
            };
            let hours = match rt.check_interval_hours {
                Some(0) => {
                    warn!(topic = %rt.name, "check_interval_hours=0, using default");
                    self.default_check_interval_hours
                }
                Some(h) => h,
                None => self.default_check_interval_hours,
            };
            let topic = Topic {
                name: rt.name.trim().to_string(),
                description: rt.description,
                search_queries: rt.search_queries,
                urls_to_check: rt.urls_to_check,
                check_interval_hours: hours,
            };
            if let Err(e) = topic.validate() {
                warn!("skipping topic: {e}");
                continue;
            }
            if self.topics.iter().any(|t| t.matches_name(&topic.name)) {
                warn!(topic = %topic.name, "duplicate topic name, keeping the first");
                continue;
            }
            self.topics.push(topic);
        }
    }

    fn apply_env<F>(&mut self, env: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = env("ANTHROPIC_API_KEY").filter(|k| !k.trim().is_empty()) {
            self.anthropic_api_key = Some(key);
        }
        if let Some(key) = env("OPENAI_API_KEY").filter(|k| !k.trim().is_empty()) {
            self.openai_api_key = Some(key);
        }
        if env("WATCHDOG_REQUIRE_AC").is_some_and(|v| v.eq_ignore_ascii_case("false")) {
            self.require_ac_power = false;
        }
        if let Some(v) = env("WATCHDOG_ORACLE") {
            match OracleProvider::parse(&v) {
                Some(p) => self.oracle_provider = p,
                None => warn!("ignoring unknown WATCHDOG_ORACLE={v}"),
            }
        }
    }

    /// API key for the selected provider, if any. Placeholder keys count as missing.
    pub fn api_key(&self) -> Option<&str> {
        let key = match self.oracle_provider {
            OracleProvider::Anthropic => self.anthropic_api_key.as_deref(),
            OracleProvider::OpenAi => self.openai_api_key.as_deref(),
            OracleProvider::Mock => return None,
        };
        key.map(str::trim)
            .filter(|k| !k.is_empty() && !k.contains("YOUR-KEY"))
    }

    /// Hard requirements before running checks.
    pub fn validate_for_run(&self) -> Result<()> {
        if self.oracle_provider != OracleProvider::Mock && self.api_key().is_none() {
            let var = match self.oracle_provider {
                OracleProvider::OpenAi => "OPENAI_API_KEY",
                _ => "ANTHROPIC_API_KEY",
            };
            bail!("{var} not set; add it to {} or export it", self.config_path.display());
        }
        if self.topics.is_empty() {
            bail!("no topics configured; edit {}", self.config_path.display());
        }
        Ok(())
    }
}

const DEFAULT_CONFIG_TEMPLATE: &str = r#"# Watchdog Agent configuration

# Anthropic API key (or set ANTHROPIC_API_KEY)
# anthropic_api_key: sk-ant-...

# anthropic | openai | mock
oracle_provider: anthropic

# Only run checks when on AC power
require_ac_power: true

# Skip checks when the user has been idle this long
idle_threshold_minutes: 5

# Interval used by topics that do not set their own
default_check_interval_hours: 24

# Never check a topic more often than this
min_check_interval_minutes: 30

topics:
  - name: "HP ZBook Battery Charge Limit"
    description: "Monitor for HP ZBook Ultra G1a battery charge threshold/limit support in BIOS or Linux"
    search_queries:
      - "HP ZBook Ultra G1a battery charge limit"
      - "HP ZBook G1a BIOS update battery"
      - "HP laptop Linux charge threshold support"
    urls_to_check:
      - "https://h30434.www3.hp.com/t5/Notebook-Software-and-How-To-Questions/Limit-Battery-Charge-to-80/td-p/8380809"
    check_interval_hours: 48

  # - name: "Example Software Release"
  #   description: "Watch for new releases of Example Software"
  #   search_queries:
  #     - "example software release notes"
  #   urls_to_check:
  #     - "https://example.com/releases"
  #   check_interval_hours: 24
"#;

/// Write the commented template. Refuses to overwrite an existing file.
pub fn write_default_config(path: &Path) -> Result<()> {
    if path.exists() {
        bail!("config already exists: {}", path.display());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    std::fs::write(path, DEFAULT_CONFIG_TEMPLATE)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
