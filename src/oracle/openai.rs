// src/oracle/openai.rs
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{clip_body, OracleError, OracleFuture, VerdictOracle};

const CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// OpenAI provider (Chat Completions API).
pub struct OpenAiOracle {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiOracle {
    /// `model`: pass Some("gpt-4o") to override; defaults to gpt-4o-mini.
    pub fn new(api_key: &str, model: Option<&str>, timeout: Duration) -> Result<Self, OracleError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("watchdog-agent/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4))
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
            return Err(OracleError::MissingApiKey("openai"));
        }

        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
            max_tokens: u32,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            #[serde(default)]
            content: Option<String>,
        }

        let req = Req {
            model: &self.model,
            messages: vec![Msg {
                role: "user",
                content: prompt,
            }],
            temperature: 0.2,
            max_tokens: 500,
        };

        let resp = self
            .http
            .post(CHAT_COMPLETIONS_URL)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(OracleError::Status {
                provider: "openai",
                status,
                body: clip_body(&body),
            });
        }

        let body: Resp = resp.json().await?;
        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|t| !t.trim().is_empty())
            .ok_or(OracleError::EmptyResponse)
    }
}

impl VerdictOracle for OpenAiOracle {
    fn ask<'a>(&'a self, prompt: &'a str) -> OracleFuture<'a> {
        Box::pin(self.ask_impl(prompt))
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}
