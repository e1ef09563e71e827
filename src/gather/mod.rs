// src/gather/mod.rs
pub mod page;
pub mod search;

use async_trait::async_trait;
use chrono::Datelike;
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::topic::Topic;

pub use page::{extract_visible_text, HttpPageFetcher};
pub use search::{DuckDuckGo, SearchHit};

/// Search queries consulted per topic.
pub const MAX_QUERIES: usize = 3;
/// Results kept per search query.
pub const MAX_RESULTS_PER_QUERY: usize = 3;
/// Direct URLs fetched per topic.
pub const MAX_URLS: usize = 3;
/// Visible text extracted from a page before anything else.
pub const PAGE_TEXT_LIMIT: usize = 15_000;
/// Text kept per fetched-page fragment.
pub const FETCH_TEXT_LIMIT: usize = 3_000;

const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
    SearchResult { query: String },
    FetchedUrl,
}

/// One piece of gathered text with its provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    pub kind: SourceKind,
    pub source_url: String,
    pub title: Option<String>,
    pub text: String,
}

impl Fragment {
    pub fn search(query: &str, hit: SearchHit) -> Self {
        Self {
            kind: SourceKind::SearchResult {
                query: query.to_string(),
            },
            source_url: hit.url,
            title: Some(hit.title),
            text: hit.snippet,
        }
    }

    /// Page text is capped at [`FETCH_TEXT_LIMIT`] characters.
    pub fn page(url: &str, text: &str) -> Self {
        Self {
            kind: SourceKind::FetchedUrl,
            source_url: url.to_string(),
            title: None,
            text: truncate_chars(text, FETCH_TEXT_LIMIT),
        }
    }

    /// Labelled block as it appears in the prompt and the fingerprint.
    pub fn render(&self) -> String {
        match &self.kind {
            SourceKind::SearchResult { query } => format!(
                "Search result for '{query}':\nTitle: {}\nURL: {}\nSnippet: {}\n",
                self.title.as_deref().unwrap_or_default(),
                self.source_url,
                self.text
            ),
            SourceKind::FetchedUrl => format!("Content from {}:\n{}\n", self.source_url, self.text),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GatherError {
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP status {0}")]
    Status(reqwest::StatusCode),
}

/// Produces the ordered fragments for a topic. Never fails: sources that
/// error out simply contribute nothing.
#[async_trait]
pub trait ContentGatherer: Send + Sync {
    async fn gather(&self, topic: &Topic) -> Vec<Fragment>;
}

#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, GatherError>;
    fn name(&self) -> &'static str;
}

#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Visible text of the page, already capped at [`PAGE_TEXT_LIMIT`].
    async fn fetch_text(&self, url: &str) -> Result<String, GatherError>;
}

/// Shared HTTP client for search and page fetches.
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client, GatherError> {
    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(10).min(timeout))
        .timeout(timeout)
        .build()?;
    Ok(client)
}

/// "2025 2026" style suffix nudging search engines toward recent results.
pub fn recency_suffix(year: i32) -> String {
    format!("{} {}", year - 1, year)
}

/// Search + direct fetch with the per-topic caps applied.
pub struct WebGatherer {
    search: Box<dyn SearchBackend>,
    pages: Box<dyn PageFetcher>,
    query_suffix: Option<String>,
}

impl WebGatherer {
    pub fn new(search: Box<dyn SearchBackend>, pages: Box<dyn PageFetcher>) -> Self {
        let year = chrono::Local::now().year();
        Self {
            search,
            pages,
            query_suffix: Some(recency_suffix(year)),
        }
    }

    /// DuckDuckGo HTML search + plain HTTP fetches over one client.
    pub fn from_timeout(timeout: Duration) -> Result<Self, GatherError> {
        let http = build_http_client(timeout)?;
        Ok(Self::new(
            Box::new(DuckDuckGo::new(http.clone())),
            Box::new(HttpPageFetcher::new(http)),
        ))
    }

    pub fn with_query_suffix(mut self, suffix: Option<String>) -> Self {
        self.query_suffix = suffix;
        self
    }

    fn decorate(&self, query: &str) -> String {
        match &self.query_suffix {
            Some(s) => format!("{query} {s}"),
            None => query.to_string(),
        }
    }
}

#[async_trait]
impl ContentGatherer for WebGatherer {
    async fn gather(&self, topic: &Topic) -> Vec<Fragment> {
        let mut out = Vec::new();

        for query in topic.search_queries.iter().take(MAX_QUERIES) {
            let q = self.decorate(query);
            match self.search.search(&q).await {
                Ok(hits) => {
                    debug!(topic = %topic.name, query = %q, hits = hits.len(), "search ok");
                    out.extend(
                        hits.into_iter()
                            .take(MAX_RESULTS_PER_QUERY)
                            .map(|hit| Fragment::search(query, hit)),
                    );
                }
                Err(e) => {
                    warn!(topic = %topic.name, query = %q, backend = self.search.name(), "search failed: {e}");
                    counter!("watchdog_gather_errors_total").increment(1);
                }
            }
        }

        for url in topic.urls_to_check.iter().take(MAX_URLS) {
            match self.pages.fetch_text(url).await {
                Ok(text) if !text.trim().is_empty() => out.push(Fragment::page(url, &text)),
                Ok(_) => debug!(topic = %topic.name, url = %url, "page had no visible text"),
                Err(e) => {
                    warn!(topic = %topic.name, url = %url, "fetch failed: {e}");
                    counter!("watchdog_gather_errors_total").increment(1);
                }
            }
        }

        histogram!("watchdog_gather_fragments").record(out.len() as f64);
        out
    }
}

pub(crate) fn truncate_chars(s: &str, limit: usize) -> String {
    match s.char_indices().nth(limit) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
