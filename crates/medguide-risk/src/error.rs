use thiserror::Error;

#[derive(Debug, Error)]
pub enum RiskError {
    #[error("failed to parse risk table: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("failed to read risk table: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid risk table: {0}")]
    Invalid(String),
}
