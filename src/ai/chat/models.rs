//! The core models for curating a transcript with an LLM.
use serde::{Deserialize, Serialize};

/// Speaker of a turn. The system prompt is session configuration
/// and never appears as a turn.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum Role {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "assistant")]
    Assistant,
}

impl Role {
    /// The role that has to speak after this one.
    pub fn next(self) -> Self {
        match self {
            Role::User => Role::Assistant,
            Role::Assistant => Role::User,
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct Turn {
    role: Role,
    pub content: String,
}

impl Turn {
    pub fn new(role: Role, content: &str) -> Self {
        Turn {
            role,
            content: content.to_string(),
        }
    }

    pub fn user(content: &str) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: &str) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn role(&self) -> Role {
        self.role
    }
}

/// Frozen copy of a session taken right before it is written to the
/// dataset. Nothing in here can change after `finalize_for_save`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FinalizedTranscript {
    system_prompt: String,
    turns: Vec<Turn>,
}

impl FinalizedTranscript {
    pub(crate) fn new(system_prompt: &str, turns: Vec<Turn>) -> Self {
        Self {
            system_prompt: system_prompt.to_string(),
            turns,
        }
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }
}
