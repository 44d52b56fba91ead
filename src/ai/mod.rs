pub mod chat;
pub mod completion;

pub use completion::{BoxedCompletion, Completion};
