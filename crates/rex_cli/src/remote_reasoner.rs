//! A thin `ExternalReasoner` adapter over the Anthropic Messages API.
//!
//! Deliberately minimal: the think cycle only needs a prompt-in, text-out
//! seam (tool-use, streaming, and multi-turn history are owned by
//! `ToolDispatcher` and the context composed per-cycle, not by this client).

use anyhow::{Context, Result};
use reqwest::Client;
use rex_reasoning::{with_retry, RetryConfig};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AnthropicReasoner {
    client: Client,
    api_key: String,
    model: String,
}

impl AnthropicReasoner {
    pub fn new(model: &str, timeout_secs: u64) -> Result<Self> {
        let api_key = env::var("ANTHROPIC_API_KEY").context("ANTHROPIC_API_KEY not set")?;
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build reasoner http client")?;
        Ok(Self {
            client,
            api_key,
            model: model.to_string(),
        })
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    system: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[async_trait::async_trait]
impl rex_reasoning::ExternalReasoner for AnthropicReasoner {
    #[tracing::instrument(skip(self, system, prompt), fields(model = %self.model))]
    async fn think(&self, system: &str, prompt: &str) -> Result<String> {
        let base_url =
            env::var("ANTHROPIC_BASE_URL").unwrap_or_else(|_| "https://api.anthropic.com".to_string());
        let url = format!("{}/v1/messages", base_url.trim_end_matches('/'));

        with_retry(&RetryConfig::default(), "anthropic", || async {
            let request_body = MessagesRequest {
                model: &self.model,
                system,
                max_tokens: 1024,
                messages: vec![Message {
                    role: "user",
                    content: prompt,
                }],
            };

            let response = self
                .client
                .post(&url)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", "2023-06-01")
                .json(&request_body)
                .send()
                .await
                .context("reasoner request failed")?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                anyhow::bail!("reasoner returned {status}: {body}");
            }

            let parsed: MessagesResponse = response.json().await.context("malformed reasoner response")?;
            Ok(parsed
                .content
                .into_iter()
                .map(|block| block.text)
                .collect::<Vec<_>>()
                .join(""))
        })
        .await
    }
}
