use thiserror::Error;

#[derive(Debug, Error)]
pub enum TermsError {
    #[error("failed to parse lexicon: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("failed to read lexicon file: {0}")]
    Io(#[from] std::io::Error),

    #[error("duplicate lexicon code: {0}")]
    DuplicateCode(String),

    #[error("alias {alias:?} already maps to {existing}")]
    DuplicateAlias { alias: String, existing: String },

    #[error("unknown canonical code: {0}")]
    UnknownCode(String),
}
