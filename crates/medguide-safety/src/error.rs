use thiserror::Error;

#[derive(Debug, Error)]
pub enum SafetyError {
    #[error("failed to parse safety rules: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("failed to read safety rules: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid safety rule {rule_id}: {reason}")]
    InvalidRule { rule_id: String, reason: String },
}
