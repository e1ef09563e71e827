// src/gather/page.rs
use async_trait::async_trait;
use scraper::Html;

use super::{truncate_chars, GatherError, PageFetcher, PAGE_TEXT_LIMIT};

/// Subtrees that never carry page content.
const SKIPPED_TAGS: [&str; 5] = ["script", "style", "nav", "footer", "header"];

pub struct HttpPageFetcher {
    http: reqwest::Client,
}

impl HttpPageFetcher {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String, GatherError> {
        let resp = self.http.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(GatherError::Status(status));
        }
        let body = resp.text().await?;
        Ok(extract_visible_text(&body, PAGE_TEXT_LIMIT))
    }
}

/// Visible text of an HTML document, one trimmed text run per line, capped at
/// `limit` characters.
pub fn extract_visible_text(html: &str, limit: usize) -> String {
    let doc = Html::parse_document(html);
    let mut lines: Vec<&str> = Vec::new();

    for node in doc.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let line = text.trim();
        if line.is_empty() {
            continue;
        }
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| SKIPPED_TAGS.contains(&e.name()))
        });
        if !hidden {
            lines.push(line);
        }
    }

    truncate_chars(&lines.join("\n"), limit)
}
