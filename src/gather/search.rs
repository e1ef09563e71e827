// src/gather/search.rs
use async_trait::async_trait;
use metrics::histogram;
use once_cell::sync::Lazy;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

use super::{GatherError, SearchBackend};

const DDG_HTML_ENDPOINT: &str = "https://html.duckduckgo.com/html/";
/// Results parsed per page; the gatherer keeps fewer.
const MAX_PARSED_RESULTS: usize = 5;

static RESULT: Lazy<Selector> = Lazy::new(|| Selector::parse(".result").unwrap());
static RESULT_TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse(".result__title a").unwrap());
static RESULT_SNIPPET: Lazy<Selector> = Lazy::new(|| Selector::parse(".result__snippet").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// DuckDuckGo's JavaScript-free endpoint; needs no API key.
pub struct DuckDuckGo {
    http: reqwest::Client,
}

impl DuckDuckGo {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl SearchBackend for DuckDuckGo {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, GatherError> {
        let resp = self
            .http
            .post(DDG_HTML_ENDPOINT)
            .form(&[("q", query)])
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(GatherError::Status(status));
        }
        let body = resp.text().await?;

        let t0 = std::time::Instant::now();
        let hits = parse_results(&body);
        histogram!("watchdog_search_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        Ok(hits)
    }

    fn name(&self) -> &'static str {
        "duckduckgo"
    }
}

/// Parse a DuckDuckGo HTML result page. Results without a title link are skipped.
pub fn parse_results(html: &str) -> Vec<SearchHit> {
    let doc = Html::parse_document(html);
    let mut out = Vec::new();

    for result in doc.select(&RESULT).take(MAX_PARSED_RESULTS) {
        let Some(title) = result.select(&RESULT_TITLE).next() else {
            continue;
        };
        let href = title.value().attr("href").unwrap_or_default();
        let snippet = result
            .select(&RESULT_SNIPPET)
            .next()
            .map(element_text)
            .unwrap_or_default();

        out.push(SearchHit {
            title: element_text(title),
            url: unwrap_redirect(href),
            snippet,
        });
    }
    out
}

/// DuckDuckGo wraps targets as `//duckduckgo.com/l/?uddg=<encoded>`; return the target.
pub fn unwrap_redirect(href: &str) -> String {
    if !href.contains("uddg=") {
        return href.to_string();
    }
    let Ok(base) = Url::parse("https://duckduckgo.com/") else {
        return href.to_string();
    };
    base.join(href)
        .ok()
        .and_then(|u| {
            u.query_pairs()
                .find(|(k, _)| k == "uddg")
                .map(|(_, v)| v.into_owned())
        })
        .unwrap_or_else(|| href.to_string())
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
