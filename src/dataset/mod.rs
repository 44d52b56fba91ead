pub mod error;
pub mod models;
pub mod writer;

pub use error::StoreError;
pub use models::{DatasetRecord, RecordMessage, RecordRole};
pub use writer::{DatasetWriter, StoreStats, encode_record};
