//! Anthropic Messages API client.
//!
//! Unlike the chat completions API, the system prompt is a top level
//! field and `messages` only holds the alternating user/assistant
//! turns.

use std::time::Duration;

use anyhow::{Context, Error, Result, bail};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::ai::chat::Turn;
use crate::ai::completion::Completion;

pub const DEFAULT_HOST: &str = "https://api.anthropic.com";
pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20240620";
const API_VERSION: &str = "2023-06-01";

#[derive(Serialize, Debug)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: &'a [Turn],
}

/// Response body of a successful request
#[derive(Deserialize, Debug)]
pub struct MessagesResponse {
    pub content: Vec<ContentBlock>,

    #[serde(default)]
    pub stop_reason: Option<String>,
}

/// Content block information
#[derive(Deserialize, Debug)]
pub struct ContentBlock {
    /// Type of content block (text, tool_use, ...)
    #[serde(rename = "type")]
    pub block_type: String,

    /// Set for text blocks
    #[serde(default)]
    pub text: Option<String>,
}

impl MessagesResponse {
    /// All text blocks joined together. Other block types are ignored.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter(|b| b.block_type == "text")
            .filter_map(|b| b.text.as_deref())
            .collect()
    }
}

#[derive(Clone, Debug)]
pub struct ClaudeCompletion {
    api_hostname: String,
    api_key: String,
    model: String,
}

impl ClaudeCompletion {
    pub fn new(api_hostname: &str, api_key: &str, model: &str) -> Self {
        Self {
            api_hostname: api_hostname.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl Completion for ClaudeCompletion {
    async fn generate(
        &self,
        system_prompt: &str,
        turns: &[Turn],
        max_tokens: u32,
    ) -> Result<String, Error> {
        let payload = MessagesRequest {
            model: &self.model,
            max_tokens,
            system: system_prompt,
            messages: turns,
        };
        let url = format!("{}/v1/messages", self.api_hostname.trim_end_matches("/"));

        tracing::debug!("Requesting {} with {} turns", self.model, turns.len());

        let response = reqwest::Client::new()
            .post(url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("Content-Type", "application/json")
            .timeout(Duration::from_secs(60 * 10))
            .json(&payload)
            .send()
            .await
            .context("Messages request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Messages API returned {}: {}", status, body);
        }

        let resp: MessagesResponse = response
            .json()
            .await
            .context("Failed to parse messages response")?;
        if resp.stop_reason.as_deref() == Some("max_tokens") {
            tracing::warn!("Reply was cut off at {} max tokens", max_tokens);
        }

        Ok(resp.text())
    }
}
