use thiserror::Error;

#[derive(Debug, Error)]
pub enum EvidenceError {
    /// One or more sources could not answer. Never reported as an empty
    /// result.
    #[error("evidence source unavailable ({sources}): {reason}")]
    SourceUnavailable { sources: String, reason: String },

    #[error("tantivy error: {0}")]
    Tantivy(#[from] tantivy::TantivyError),

    #[error("index corrupted: {0}")]
    IndexCorrupted(String),

    #[error("record store error: {0}")]
    RecordStore(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
