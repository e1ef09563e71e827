// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod cache;
pub mod config;
pub mod daemon;
pub mod engine;
pub mod gate;
pub mod gather;
pub mod manager;
pub mod notify;
pub mod oracle;
pub mod scheduler;
pub mod telemetry;
pub mod topic;
pub mod verdict;

// ---- Re-exports for stable public API ----
pub use crate::cache::{fingerprint, FingerprintCache, TopicCacheEntry};
pub use crate::config::{AgentConfig, OracleProvider};
pub use crate::daemon::{Daemon, DaemonSettings, TickReport};
pub use crate::engine::UpdateEngine;
pub use crate::gate::{GateDecision, IdleProbe, PowerProbe, Signal, SystemGate};
pub use crate::gather::{ContentGatherer, Fragment, WebGatherer};
pub use crate::manager::{extract_action, ActionOutcome, ManagerAction, TopicBook};
pub use crate::notify::{Notifier, NotifierMux, UpdateNotice};
pub use crate::oracle::{DynOracle, MockOracle, OracleError, VerdictOracle};
pub use crate::scheduler::{due_topics, ScheduleState};
pub use crate::topic::Topic;
pub use crate::verdict::{parse_verdict, Verdict, NOTIFY_CONFIDENCE_THRESHOLD};

use anyhow::Result;
use std::sync::Arc;

/// Wire the production engine (web gatherer, configured oracle, on-disk cache).
pub fn build_engine(cfg: &AgentConfig) -> Result<UpdateEngine> {
    let gatherer = WebGatherer::from_timeout(cfg.http_timeout)?;
    let oracle = oracle::build_oracle(cfg)?;
    Ok(UpdateEngine::new(
        Arc::new(gatherer),
        oracle,
        FingerprintCache::new(&cfg.cache_dir),
    )
    .with_oracle_timeout(cfg.oracle_timeout))
}
