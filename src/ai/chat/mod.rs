pub mod core;
pub mod error;
pub mod models;

pub use self::core::{BusyFlag, ConversationSession, SessionBuilder};
pub use error::SessionError;
pub use models::{FinalizedTranscript, Role, Turn};
