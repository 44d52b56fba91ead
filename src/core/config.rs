use std::env;

use clap::ValueEnum;

use crate::ai::chat::core::{DEFAULT_SYSTEM_PROMPT, MAX_MAX_TOKENS, clamp_max_tokens};
use crate::ai::completion::BoxedCompletion;
use crate::anthropic::{self, ClaudeCompletion};
use crate::openai::{self, OpenAiCompletion};

pub const DEFAULT_DATASET_PATH: &str = "conversations.jsonl";

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Provider {
    Anthropic,
    #[value(name = "openai")]
    OpenAi,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub dataset_path: String,
    pub system_message: String,
    pub max_tokens: u32,
    pub provider: Provider,
    pub llm_host: Option<String>,
    pub llm_model: Option<String>,
    pub anthropic_api_key: String,
    pub openai_api_key: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }
}

impl AppConfig {
    /// Builds the config from a variable lookup, `Default` uses the
    /// process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let dataset_path =
            lookup("CURATOR_DATASET_PATH").unwrap_or_else(|| DEFAULT_DATASET_PATH.to_string());
        let system_message =
            lookup("CURATOR_SYSTEM_MESSAGE").unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());
        let max_tokens = match lookup("CURATOR_MAX_TOKENS") {
            Some(v) => match v.trim().parse::<u32>() {
                Ok(n) => clamp_max_tokens(n),
                Err(e) => {
                    tracing::warn!("Ignoring CURATOR_MAX_TOKENS={}: {}", v, e);
                    MAX_MAX_TOKENS
                }
            },
            None => MAX_MAX_TOKENS,
        };
        let provider = match lookup("CURATOR_PROVIDER") {
            Some(v) => Provider::from_str(v.trim(), true).unwrap_or_else(|e| {
                tracing::warn!("Ignoring CURATOR_PROVIDER={}: {}", v, e);
                Provider::Anthropic
            }),
            None => Provider::Anthropic,
        };

        Self {
            dataset_path,
            system_message,
            max_tokens,
            provider,
            llm_host: lookup("CURATOR_LLM_HOST"),
            llm_model: lookup("CURATOR_LLM_MODEL"),
            anthropic_api_key: lookup("ANTHROPIC_API_KEY").unwrap_or_default(),
            openai_api_key: lookup("OPENAI_API_KEY").unwrap_or_default(),
        }
    }

    pub fn llm_host(&self) -> &str {
        self.llm_host.as_deref().unwrap_or(match self.provider {
            Provider::Anthropic => anthropic::claude::DEFAULT_HOST,
            Provider::OpenAi => openai::core::DEFAULT_HOST,
        })
    }

    pub fn llm_model(&self) -> &str {
        self.llm_model.as_deref().unwrap_or(match self.provider {
            Provider::Anthropic => anthropic::claude::DEFAULT_MODEL,
            Provider::OpenAi => openai::core::DEFAULT_MODEL,
        })
    }

    /// The completion backend for the configured provider.
    pub fn completion(&self) -> BoxedCompletion {
        match self.provider {
            Provider::Anthropic => Box::new(ClaudeCompletion::new(
                self.llm_host(),
                &self.anthropic_api_key,
                self.llm_model(),
            )),
            Provider::OpenAi => Box::new(OpenAiCompletion::new(
                self.llm_host(),
                &self.openai_api_key,
                self.llm_model(),
            )),
        }
    }
}
