use anyhow::{Error, Result};
use async_trait::async_trait;

use super::chat::models::Turn;

/// Anything that can produce the next assistant reply for a system
/// prompt and an alternating user/assistant history.
///
/// Implementations must not retry on their own, a retry is always
/// something the user asks for.
#[async_trait]
pub trait Completion {
    async fn generate(
        &self,
        system_prompt: &str,
        turns: &[Turn],
        max_tokens: u32,
    ) -> Result<String, Error>;
}

pub type BoxedCompletion = Box<dyn Completion + Send + Sync + 'static>;
