use serde::{Deserialize, Serialize};

use crate::ai::chat::{FinalizedTranscript, Role};

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum RecordRole {
    #[serde(rename = "system")]
    System,
    #[serde(rename = "user")]
    User,
    #[serde(rename = "assistant")]
    Assistant,
}

impl From<Role> for RecordRole {
    fn from(role: Role) -> Self {
        match role {
            Role::User => RecordRole::User,
            Role::Assistant => RecordRole::Assistant,
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct RecordMessage {
    pub role: RecordRole,
    pub content: String,
}

impl RecordMessage {
    pub fn new(role: RecordRole, content: &str) -> Self {
        Self {
            role,
            content: content.to_string(),
        }
    }
}

/// One line of the dataset in the chat fine-tuning format: the system
/// prompt first, then the transcript as it was when it was saved.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct DatasetRecord {
    pub messages: Vec<RecordMessage>,
}

impl From<&FinalizedTranscript> for DatasetRecord {
    fn from(transcript: &FinalizedTranscript) -> Self {
        let mut messages = Vec::with_capacity(transcript.turns().len() + 1);
        messages.push(RecordMessage::new(
            RecordRole::System,
            transcript.system_prompt(),
        ));
        messages.extend(
            transcript
                .turns()
                .iter()
                .map(|t| RecordMessage::new(t.role().into(), &t.content)),
        );
        Self { messages }
    }
}
