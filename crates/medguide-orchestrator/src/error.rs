use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("insufficient data: {0}")]
    DataInsufficient(String),

    #[error("evidence source unavailable ({sources}): {reason}")]
    SourceUnavailable { sources: String, reason: String },

    #[error("safety rules {rule_ids:?} disagree on {target}")]
    RuleConflict { target: String, rule_ids: Vec<String> },

    #[error("text generation timed out after {0} ms")]
    GenerationTimeout(u64),

    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("session {0} already has a turn in flight")]
    SessionBusy(String),

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("no chart for patient {0}")]
    PatientNotFound(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("rule table error: {0}")]
    RuleTable(String),

    #[error("template error: {0}")]
    Template(#[from] tera::Error),

    #[error(transparent)]
    State(#[from] medguide_core::CoreError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<medguide_evidence::EvidenceError> for OrchestratorError {
    fn from(e: medguide_evidence::EvidenceError) -> Self {
        match e {
            medguide_evidence::EvidenceError::SourceUnavailable { sources, reason } => {
                OrchestratorError::SourceUnavailable { sources, reason }
            }
            other => OrchestratorError::SourceUnavailable {
                sources: "evidence".to_string(),
                reason: other.to_string(),
            },
        }
    }
}

impl From<medguide_terms::TermsError> for OrchestratorError {
    fn from(e: medguide_terms::TermsError) -> Self {
        OrchestratorError::RuleTable(format!("lexicon: {e}"))
    }
}

impl From<medguide_risk::RiskError> for OrchestratorError {
    fn from(e: medguide_risk::RiskError) -> Self {
        OrchestratorError::RuleTable(format!("risk table: {e}"))
    }
}

impl From<medguide_safety::SafetyError> for OrchestratorError {
    fn from(e: medguide_safety::SafetyError) -> Self {
        OrchestratorError::RuleTable(format!("safety rules: {e}"))
    }
}
