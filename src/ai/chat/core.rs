use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::error::SessionError;
use super::models::{FinalizedTranscript, Role, Turn};
use crate::ai::completion::BoxedCompletion;

pub const MIN_MAX_TOKENS: u32 = 256;
pub const MAX_MAX_TOKENS: u32 = 4096;
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Out of range values are clamped rather than rejected.
pub fn clamp_max_tokens(n: u32) -> u32 {
    n.clamp(MIN_MAX_TOKENS, MAX_MAX_TOKENS)
}

/// Shared view of whether a session is waiting on the completion
/// backend. Clone it before starting a generation to watch it from
/// another task, e.g. to draw a spinner.
#[derive(Clone, Debug, Default)]
pub struct BusyFlag(Arc<AtomicBool>);

impl BusyFlag {
    pub fn is_busy(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn enter(&self) -> BusyGuard {
        self.0.store(true, Ordering::SeqCst);
        BusyGuard(self.clone())
    }
}

// Clears the flag even when the in-flight future is dropped
struct BusyGuard(BusyFlag);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        (self.0).0.store(false, Ordering::SeqCst);
    }
}

/// An in-progress transcript that is being curated before it gets
/// written to a dataset.
///
/// Turns always alternate user/assistant starting with a user turn.
/// Only assistant turns can be edited and at most one edit can be
/// open at a time. Generation borrows the session mutably so
/// overlapping `send_user_message`/`retry_last_assistant` calls are
/// impossible; `busy_handle` exposes the single suspension point to
/// drivers that render progress concurrently.
///
/// Use `SessionBuilder` to construct a `ConversationSession`.
pub struct ConversationSession {
    completion: BoxedCompletion,
    system_prompt: String,
    turns: Vec<Turn>,
    active_edit: Option<usize>,
    max_tokens: u32,
    busy: BusyFlag,
}

impl ConversationSession {
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn active_edit(&self) -> Option<usize> {
        self.active_edit
    }

    /// Current text of the turn under edit, used to pre-fill an editor.
    pub fn editing_content(&self) -> Option<&str> {
        self.active_edit
            .and_then(|i| self.turns.get(i))
            .map(|t| t.content.as_str())
    }

    pub fn is_busy(&self) -> bool {
        self.busy.is_busy()
    }

    pub fn busy_handle(&self) -> BusyFlag {
        self.busy.clone()
    }

    /// Who is expected to speak next.
    pub fn next_speaker(&self) -> Role {
        self.turns
            .last()
            .map(|t| t.role().next())
            .unwrap_or(Role::User)
    }

    /// The only suspension point of a session.
    async fn generate(&self) -> Result<String, SessionError> {
        let _guard = self.busy.enter();
        self.completion
            .generate(&self.system_prompt, &self.turns, self.max_tokens)
            .await
            .map_err(SessionError::GenerationFailed)
    }

    /// Appends a user turn and the assistant's reply to it, returning
    /// the reply.
    ///
    /// If generation fails the user turn is kept so the input isn't
    /// lost. The transcript then ends with a user turn, use
    /// `answer_pending_user` to try again.
    pub async fn send_user_message(&mut self, text: &str) -> Result<String, SessionError> {
        if self.active_edit.is_some() {
            return Err(SessionError::EditPending);
        }
        if text.is_empty() {
            return Err(SessionError::invalid("message is empty"));
        }
        if self.next_speaker() != Role::User {
            return Err(SessionError::invalid(
                "the last user message has not been answered yet",
            ));
        }

        self.turns.push(Turn::user(text));
        tracing::debug!("Sending user turn {}", self.turns.len() - 1);

        let reply = self.generate().await.inspect_err(|e| {
            tracing::warn!("Keeping unanswered user turn after failure: {}", e)
        })?;
        self.turns.push(Turn::assistant(&reply));

        Ok(reply)
    }

    /// Replaces the trailing assistant turn with a freshly generated
    /// one, returning the new reply.
    ///
    /// The old reply is removed before generating. On failure it stays
    /// removed and the transcript ends with the user turn, which
    /// `answer_pending_user` picks up again.
    pub async fn retry_last_assistant(&mut self) -> Result<String, SessionError> {
        if self.active_edit.is_some() {
            return Err(SessionError::EditPending);
        }
        match self.turns.last() {
            Some(turn) if turn.role() == Role::Assistant => {}
            _ => {
                return Err(SessionError::invalid(
                    "retry needs a trailing assistant turn",
                ));
            }
        }

        let removed = self.turns.pop();
        tracing::debug!(
            "Retrying assistant turn {} (was {} bytes)",
            self.turns.len(),
            removed.map(|t| t.content.len()).unwrap_or_default()
        );

        let reply = self.generate().await.inspect_err(|e| {
            tracing::warn!("Retry failed, assistant turn stays removed: {}", e)
        })?;
        self.turns.push(Turn::assistant(&reply));

        Ok(reply)
    }

    /// Generates the reply to a trailing user turn left unanswered by a
    /// failed `send_user_message` or `retry_last_assistant`.
    pub async fn answer_pending_user(&mut self) -> Result<String, SessionError> {
        if self.active_edit.is_some() {
            return Err(SessionError::EditPending);
        }
        if self.next_speaker() != Role::Assistant {
            return Err(SessionError::invalid("there is no unanswered user turn"));
        }

        let reply = self.generate().await?;
        self.turns.push(Turn::assistant(&reply));

        Ok(reply)
    }

    /// Opens an edit on the assistant turn at `index`. Any edit that
    /// was already open is dropped without touching its turn.
    pub fn begin_edit(&mut self, index: usize) -> Result<(), SessionError> {
        let turn = self
            .turns
            .get(index)
            .ok_or_else(|| SessionError::invalid(format!("no turn at index {}", index)))?;
        if turn.role() != Role::Assistant {
            return Err(SessionError::invalid(format!(
                "turn {} is a user turn, only assistant turns can be edited",
                index
            )));
        }

        if let Some(previous) = self.active_edit.replace(index) {
            tracing::debug!("Dropping open edit on turn {}", previous);
        }
        tracing::debug!("Editing turn {}", index);
        Ok(())
    }

    /// Opens an edit on the most recent assistant turn.
    pub fn begin_edit_last(&mut self) -> Result<usize, SessionError> {
        let index = self
            .turns
            .iter()
            .rposition(|t| t.role() == Role::Assistant)
            .ok_or_else(|| SessionError::invalid("there is no assistant turn to edit"))?;
        self.begin_edit(index)?;
        Ok(index)
    }

    /// Replaces the content of the turn under edit. Any string is
    /// accepted, including an empty one.
    pub fn commit_edit(&mut self, new_text: &str) -> Result<(), SessionError> {
        let index = self
            .active_edit
            .ok_or_else(|| SessionError::invalid("no edit in progress"))?;
        let turn = self
            .turns
            .get_mut(index)
            .ok_or_else(|| SessionError::invalid(format!("no turn at index {}", index)))?;

        turn.content = new_text.to_string();
        self.active_edit = None;
        tracing::debug!("Committed edit on turn {}", index);
        Ok(())
    }

    pub fn cancel_edit(&mut self) {
        if let Some(index) = self.active_edit.take() {
            tracing::debug!("Cancelled edit on turn {}", index);
        }
    }

    /// Drops the transcript and any open edit. System prompt and max
    /// tokens are kept.
    pub fn discard(&mut self) {
        self.turns.clear();
        self.active_edit = None;
    }

    /// Like `discard` but refuses to throw away an open edit.
    pub fn clear(&mut self) -> Result<(), SessionError> {
        if self.active_edit.is_some() {
            return Err(SessionError::EditPending);
        }
        self.discard();
        Ok(())
    }

    /// Snapshot of the transcript for saving. Does not clear the
    /// session, call `discard` once the snapshot has been persisted.
    pub fn finalize_for_save(&self) -> Result<FinalizedTranscript, SessionError> {
        if self.turns.is_empty() {
            return Err(SessionError::invalid("there is nothing to save"));
        }
        if self.active_edit.is_some() {
            return Err(SessionError::EditPending);
        }
        Ok(FinalizedTranscript::new(&self.system_prompt, self.turns.clone()))
    }

    pub fn update_system_prompt(&mut self, text: &str) {
        self.system_prompt = text.to_string();
    }

    /// Sets max tokens, clamped to `MIN_MAX_TOKENS..=MAX_MAX_TOKENS`.
    /// Returns the value that was applied.
    pub fn update_max_tokens(&mut self, n: u32) -> u32 {
        let clamped = clamp_max_tokens(n);
        if clamped != n {
            tracing::debug!("Clamped max tokens {} to {}", n, clamped);
        }
        self.max_tokens = clamped;
        clamped
    }
}

pub struct SessionBuilder {
    completion: BoxedCompletion,
    system_prompt: String,
    max_tokens: u32,
}

impl SessionBuilder {
    pub fn new(completion: BoxedCompletion) -> Self {
        Self {
            completion,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_tokens: MAX_MAX_TOKENS,
        }
    }

    pub fn system_prompt(mut self, text: &str) -> Self {
        self.system_prompt = text.to_string();
        self
    }

    pub fn max_tokens(mut self, n: u32) -> Self {
        self.max_tokens = clamp_max_tokens(n);
        self
    }

    pub fn build(self) -> ConversationSession {
        ConversationSession {
            completion: self.completion,
            system_prompt: self.system_prompt,
            turns: Vec::new(),
            active_edit: None,
            max_tokens: self.max_tokens,
            busy: BusyFlag::default(),
        }
    }
}
