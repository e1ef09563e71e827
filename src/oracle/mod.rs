//! Oracle adapter: provider abstraction + daily budget.
//!
//! The oracle receives one prompt and returns free text; turning that text into
//! a [`crate::verdict::Verdict`] is the engine's job.

pub mod anthropic;
pub mod budget;
pub mod openai;

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::{AgentConfig, OracleProvider};

pub use anthropic::AnthropicOracle;
pub use budget::DailyBudget;
pub use openai::OpenAiOracle;

pub type OracleFuture<'a> = Pin<Box<dyn Future<Output = Result<String, OracleError>> + Send + 'a>>;

/// One-shot judgment call.
pub trait VerdictOracle: Send + Sync {
    fn ask<'a>(&'a self, prompt: &'a str) -> OracleFuture<'a>;
    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
}

pub type DynOracle = Arc<dyn VerdictOracle>;

#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("no API key configured for {0}")]
    MissingApiKey(&'static str),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{provider} returned HTTP {status}: {body}")]
    Status {
        provider: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("response contained no text")]
    EmptyResponse,
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("daily limit of {0} oracle calls reached")]
    BudgetExhausted(u32),
}

/// Build the configured oracle, wrapped in a daily budget when one is set.
pub fn build_oracle(cfg: &AgentConfig) -> Result<DynOracle, OracleError> {
    let timeout = cfg.oracle_timeout;
    let model = cfg.oracle_model.as_deref();

    let oracle: DynOracle = match cfg.oracle_provider {
        OracleProvider::Mock => return Ok(Arc::new(MockOracle::quiet())),
        OracleProvider::Anthropic => {
            let key = cfg.api_key().ok_or(OracleError::MissingApiKey("anthropic"))?;
            let inner = AnthropicOracle::new(key, model, timeout)?;
            wrap_budget(inner, cfg)
        }
        OracleProvider::OpenAi => {
            let key = cfg.api_key().ok_or(OracleError::MissingApiKey("openai"))?;
            let inner = OpenAiOracle::new(key, model, timeout)?;
            wrap_budget(inner, cfg)
        }
    };
    Ok(oracle)
}

fn wrap_budget<O: VerdictOracle + 'static>(inner: O, cfg: &AgentConfig) -> DynOracle {
    match cfg.oracle_daily_limit {
        Some(limit) => Arc::new(DailyBudget::new(inner, &cfg.cache_dir, limit)),
        None => Arc::new(inner),
    }
}

/// Canned oracle for tests and offline runs. Records every prompt it sees.
pub struct MockOracle {
    reply: Result<String, String>,
    calls: AtomicUsize,
    last_prompt: Mutex<Option<String>>,
}

impl MockOracle {
    pub fn replying(text: impl Into<String>) -> Self {
        Self {
            reply: Ok(text.into()),
            calls: AtomicUsize::new(0),
            last_prompt: Mutex::new(None),
        }
    }

    /// Fails every call with an HTTP-style error carrying `cause`.
    pub fn failing(cause: impl Into<String>) -> Self {
        Self {
            reply: Err(cause.into()),
            calls: AtomicUsize::new(0),
            last_prompt: Mutex::new(None),
        }
    }

    /// Always answers "no significant update".
    pub fn quiet() -> Self {
        Self::replying(
            r#"{"has_significant_update": false, "summary": "No changes (mock oracle)", "confidence": 0.0, "source_url": null}"#,
        )
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.last_prompt
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }
}

impl VerdictOracle for MockOracle {
    fn ask<'a>(&'a self, prompt: &'a str) -> OracleFuture<'a> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_prompt.lock().unwrap_or_else(|p| p.into_inner()) = Some(prompt.to_string());
        let out = match &self.reply {
            Ok(text) => Ok(text.clone()),
            Err(cause) => Err(OracleError::Status {
                provider: "mock",
                status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
                body: cause.clone(),
            }),
        };
        Box::pin(async move { out })
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// Keep provider error bodies short enough for a log line / verdict summary.
pub(crate) fn clip_body(body: &str) -> String {
    const MAX: usize = 200;
    let trimmed = body.trim();
    match trimmed.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}…", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}
