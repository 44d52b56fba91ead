pub mod claude;

pub use claude::ClaudeCompletion;
