// src/oracle/budget.rs
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{OracleError, OracleFuture, VerdictOracle};

/// Caps successful oracle calls per local calendar day. The counter is persisted
/// next to the topic cache so restarts do not reset it.
pub struct DailyBudget<O: VerdictOracle> {
    inner: O,
    limit: u32,
    state_path: PathBuf,
    /// Read from disk on first use.
    counter: Mutex<Option<DailyCounter>>,
}

impl<O: VerdictOracle> DailyBudget<O> {
    pub fn new(inner: O, dir: &Path, limit: u32) -> Self {
        Self {
            inner,
            limit,
            state_path: dir.join("oracle_budget.json"),
            counter: Mutex::new(None),
        }
    }

    pub async fn used_today(&self) -> u32 {
        let mut g = self.counter.lock().await;
        let dc = self.loaded(&mut g).await;
        if dc.is_expired() {
            0
        } else {
            dc.count
        }
    }

    async fn loaded<'g>(&self, slot: &'g mut Option<DailyCounter>) -> &'g mut DailyCounter {
        if slot.is_none() {
            let dc = match load_counter(&self.state_path).await {
                Ok(dc) => dc,
                Err(e) => {
                    if e.kind() != io::ErrorKind::NotFound {
                        debug!(path = %self.state_path.display(), "budget state unreadable, starting fresh: {e}");
                    }
                    DailyCounter::default()
                }
            };
            *slot = Some(dc);
        }
        slot.get_or_insert_with(DailyCounter::default)
    }

    async fn ask_impl(&self, prompt: &str) -> Result<String, OracleError> {
        {
            let mut g = self.counter.lock().await;
            let dc = self.loaded(&mut g).await;
            if dc.is_expired() {
                dc.reset_to_today();
            }
            if dc.count >= self.limit {
                return Err(OracleError::BudgetExhausted(self.limit));
            }
        }

        let out = self.inner.ask(prompt).await?;

        // Only calls that produced an answer count against the budget. The lock
        // is held through the write so saves land in count order.
        let mut g = self.counter.lock().await;
        let dc = self.loaded(&mut g).await;
        dc.count = dc.count.saturating_add(1);
        if let Err(e) = save_counter(&self.state_path, dc).await {
            warn!(path = %self.state_path.display(), "failed to persist oracle budget: {e}");
        }
        Ok(out)
    }
}

impl<O: VerdictOracle> VerdictOracle for DailyBudget<O> {
    fn ask<'a>(&'a self, prompt: &'a str) -> OracleFuture<'a> {
        Box::pin(self.ask_impl(prompt))
    }

    fn provider_name(&self) -> &'static str {
        self.inner.provider_name()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DailyCounter {
    date: String,
    count: u32,
}

impl Default for DailyCounter {
    fn default() -> Self {
        Self {
            date: today(),
            count: 0,
        }
    }
}

impl DailyCounter {
    fn is_expired(&self) -> bool {
        self.date != today()
    }

    fn reset_to_today(&mut self) {
        self.date = today();
        self.count = 0;
    }
}

fn today() -> String {
    chrono::Local::now().format("%Y-%m-%d").to_string()
}

async fn load_counter(path: &Path) -> io::Result<DailyCounter> {
    let s = fs::read_to_string(path).await?;
    serde_json::from_str(&s).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

async fn save_counter(path: &Path, dc: &DailyCounter) -> io::Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).await?;
    }
    let tmp = path.with_extension("json.tmp");
    let s = serde_json::to_vec(dc).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    fs::write(&tmp, s).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}
