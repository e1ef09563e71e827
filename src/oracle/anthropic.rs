// src/oracle/anthropic.rs
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{clip_body, OracleError, OracleFuture, VerdictOracle};

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const MAX_TOKENS: u32 = 500;

/// Anthropic Messages API.
pub struct AnthropicOracle {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl AnthropicOracle {
    pub fn new(api_key: &str, model: Option<&str>, timeout: Duration) -> Result<Self, OracleError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("watchdog-agent/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            api_key: api_key.to_string(),
            model: model.unwrap_or(DEFAULT_MODEL).to_string(),
        })
    }

    async fn ask_impl(&self, prompt: &str) -> Result<String, OracleError> {
        if self.api_key.is_empty() {
            return Err(OracleError::MissingApiKey("anthropic"));
        }

        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            max_tokens: u32,
            messages: Vec<Msg<'a>>,
        }

        let req = Req {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            messages: vec![Msg {
                role: "user",
                content: prompt,
            }],
        };

        let resp = self
            .http
            .post(MESSAGES_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&req)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(OracleError::Status {
                provider: "anthropic",
                status,
                body: clip_body(&body),
            });
        }

        let body: MessagesResponse = resp.json().await?;
        first_text(&body).ok_or(OracleError::EmptyResponse)
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

fn first_text(resp: &MessagesResponse) -> Option<String> {
    resp.content
        .iter()
        .filter(|b| b.kind == "text")
        .find_map(|b| b.text.clone())
        .filter(|t| !t.trim().is_empty())
}

impl VerdictOracle for AnthropicOracle {
    fn ask<'a>(&'a self, prompt: &'a str) -> OracleFuture<'a> {
        Box::pin(self.ask_impl(prompt))
    }

    fn provider_name(&self) -> &'static str {
        "anthropic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_first_text_block() {
        let body: MessagesResponse = serde_json::from_str(
            r#"{"id":"m","content":[{"type":"thinking","thinking":"..."},{"type":"text","text":"{\"summary\":\"ok\"}"}]}"#,
        )
        .unwrap();
        assert_eq!(first_text(&body).as_deref(), Some("{\"summary\":\"ok\"}"));
    }

    #[test]
    fn empty_content_yields_none() {
        let body: MessagesResponse = serde_json::from_str(r#"{"content":[]}"#).unwrap();
        assert!(first_text(&body).is_none());
    }
}
