use std::time::Duration;

use anyhow::{Context, Error, Result, anyhow, bail};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::ai::chat::{Role as TurnRole, Turn};
use crate::ai::completion::Completion;

pub const DEFAULT_HOST: &str = "https://api.openai.com";
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub enum Role {
    #[serde(rename = "system")]
    System,
    #[serde(rename = "assistant")]
    Assistant,
    #[serde(rename = "user")]
    User,
}

impl From<TurnRole> for Role {
    fn from(role: TurnRole) -> Self {
        match role {
            TurnRole::User => Role::User,
            TurnRole::Assistant => Role::Assistant,
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct Message {
    role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: &str) -> Self {
        Message {
            role,
            content: content.to_string(),
        }
    }
}

/// The system prompt goes first as a regular message in the chat
/// completions API.
pub fn to_messages(system_prompt: &str, turns: &[Turn]) -> Vec<Message> {
    let mut messages = Vec::with_capacity(turns.len() + 1);
    messages.push(Message::new(Role::System, system_prompt));
    messages.extend(
        turns
            .iter()
            .map(|t| Message::new(t.role().into(), &t.content)),
    );
    messages
}

pub async fn completion(
    messages: &[Message],
    max_tokens: u32,
    api_hostname: &str,
    api_key: &str,
    model: &str,
) -> Result<Value, Error> {
    let payload = json!({
        "model": model,
        "max_tokens": max_tokens,
        "messages": messages,
    });
    let url = format!("{}/v1/chat/completions", api_hostname.trim_end_matches("/"));
    let response = reqwest::Client::new()
        .post(url)
        .bearer_auth(api_key)
        .header("Content-Type", "application/json")
        .timeout(Duration::from_secs(60 * 10))
        .json(&payload)
        .send()
        .await
        .context("Chat completion request failed")?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        bail!("Chat completion returned {}: {}", status, body);
    }

    Ok(response.json().await?)
}

/// Completion backed by any OpenAI compatible chat completions API,
/// including local servers.
#[derive(Clone, Debug)]
pub struct OpenAiCompletion {
    api_hostname: String,
    api_key: String,
    model: String,
}

impl OpenAiCompletion {
    pub fn new(api_hostname: &str, api_key: &str, model: &str) -> Self {
        Self {
            api_hostname: api_hostname.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl Completion for OpenAiCompletion {
    async fn generate(
        &self,
        system_prompt: &str,
        turns: &[Turn],
        max_tokens: u32,
    ) -> Result<String, Error> {
        let messages = to_messages(system_prompt, turns);
        let resp = completion(
            &messages,
            max_tokens,
            &self.api_hostname,
            &self.api_key,
            &self.model,
        )
        .await?;

        resp["choices"][0]["message"]["content"]
            .as_str()
            .map(String::from)
            .ok_or(anyhow!("No message received. Resp:\n\n {}", resp))
    }
}
