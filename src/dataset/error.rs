#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A line that this writer could not have produced. Lines are
    /// numbered from 1.
    #[error("corrupt store at line {line}: {source}")]
    CorruptStore {
        line: usize,
        source: serde_json::Error,
    },

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoding record failed: {0}")]
    Encode(serde_json::Error),
}
