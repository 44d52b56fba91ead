/// Errors surfaced to whoever is driving a `ConversationSession`.
///
/// All of them are recoverable from the driver's point of view, the
/// session is left in a well defined state after each one.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The completion backend failed. Formatted with `{:#}` so the
    /// whole cause chain from `anyhow` ends up in the message.
    #[error("generation failed: {0:#}")]
    GenerationFailed(anyhow::Error),

    /// An edit is open and has to be committed or cancelled first.
    #[error("an edit is pending, commit or cancel it first")]
    EditPending,

    /// The operation is not valid for the current transcript.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}

impl SessionError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidOperation(msg.into())
    }
}
