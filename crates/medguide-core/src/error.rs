use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid locator: {0}")]
    InvalidLocator(String),

    #[error("invalid evidence grade: {0}")]
    InvalidGrade(String),

    #[error("unknown field id: {0}")]
    UnknownField(String),

    #[error("invalid interview transition: {from} -> {to}")]
    InvalidTransition { from: &'static str, to: &'static str },
}
