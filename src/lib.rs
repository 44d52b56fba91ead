//! Hand-curation of chat transcripts for supervised fine-tuning
//! datasets.
//!
//! A [`ConversationSession`](ai::chat::ConversationSession) holds the
//! transcript while it is being written, edited and retried. Once it
//! looks right it is frozen with `finalize_for_save` and appended to a
//! JSON lines file by a [`DatasetWriter`](dataset::DatasetWriter).
pub mod ai;
pub mod anthropic;
pub mod cli;
pub mod core;
pub mod dataset;
pub mod openai;
