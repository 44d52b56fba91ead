//! Test utilities for integration tests
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use tempfile::TempDir;

use curator::ai::chat::{ConversationSession, SessionBuilder, Turn};
use curator::ai::completion::Completion;
use curator::dataset::DatasetWriter;

/// Replies handed out in order, shared with the test so more can be
/// queued after the session owns the completion.
#[derive(Clone, Default)]
pub struct Replies(Arc<Mutex<VecDeque<Result<String>>>>);

impl Replies {
    pub fn push_ok(&self, text: &str) {
        self.0.lock().unwrap().push_back(Ok(text.to_string()));
    }

    pub fn push_err(&self, msg: &str) {
        self.0.lock().unwrap().push_back(Err(anyhow!(msg.to_string())));
    }

    fn next(&self) -> Result<String> {
        self.0
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(anyhow!("no scripted reply left")))
    }
}

pub struct ScriptedCompletion(Replies);

#[async_trait]
impl Completion for ScriptedCompletion {
    async fn generate(
        &self,
        _system_prompt: &str,
        _turns: &[Turn],
        _max_tokens: u32,
    ) -> Result<String> {
        self.0.next()
    }
}

/// A session with a scripted backend, max tokens set to 1000.
pub fn test_session(system_prompt: &str) -> (ConversationSession, Replies) {
    let replies = Replies::default();
    let session = SessionBuilder::new(Box::new(ScriptedCompletion(replies.clone())))
        .system_prompt(system_prompt)
        .max_tokens(1000)
        .build();
    (session, replies)
}

/// A writer pointed at a fresh file in a temporary directory. Keep the
/// `TempDir` alive for as long as the writer is used.
pub fn test_writer() -> (TempDir, DatasetWriter) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let writer = DatasetWriter::new(dir.path().join("conversations.jsonl"));
    (dir, writer)
}
