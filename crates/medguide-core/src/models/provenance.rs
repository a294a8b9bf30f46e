use serde::{Deserialize, Serialize};

use super::safety::Severity;

/// Something the engine did to the draft that the reader must be able to see.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProvenanceEvent {
    PlanLineRemoved {
        line_id: String,
        rule_id: String,
        reason: String,
    },
    PlanLineSubstituted {
        removed_line_id: String,
        substitute_line_id: String,
        rule_id: String,
    },
    /// A candidate line had no supporting evidence and was left out.
    PlanLineOmitted { line_id: String },
    DiagnosisOmitted { diagnosis_code: String },
    RuleConflict {
        target: String,
        rule_ids: Vec<String>,
        effective: Severity,
    },
    EvidenceUnavailable { sources: Vec<String>, reason: String },
    GenerationFallback { reason: String },
}

impl ProvenanceEvent {
    pub fn action(&self) -> &'static str {
        match self {
            ProvenanceEvent::PlanLineRemoved { .. } => "plan_line_removed",
            ProvenanceEvent::PlanLineSubstituted { .. } => "plan_line_substituted",
            ProvenanceEvent::PlanLineOmitted { .. } => "plan_line_omitted",
            ProvenanceEvent::DiagnosisOmitted { .. } => "diagnosis_omitted",
            ProvenanceEvent::RuleConflict { .. } => "rule_conflict",
            ProvenanceEvent::EvidenceUnavailable { .. } => "evidence_unavailable",
            ProvenanceEvent::GenerationFallback { .. } => "generation_fallback",
        }
    }
}
