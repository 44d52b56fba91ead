pub mod core;

pub use self::core::{Message, OpenAiCompletion, Role, completion};
