use medguide_core::models::provenance::ProvenanceEvent;
use serde::Serialize;
use tracing::info;

/// A structured audit event, logged through `tracing` so it lands in the
/// same JSON stream as every other log line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEvent {
    pub action: String,
    pub resource_type: String,
    pub resource_id: String,
    pub session_id: String,
    pub details: Option<serde_json::Value>,
}

impl AuditEvent {
    pub fn new(
        action: impl Into<String>,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            action: action.into(),
            resource_type: resource_type.into(),
            resource_id: resource_id.into(),
            session_id: session_id.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// The audit record for a provenance event raised in a session.
    pub fn from_provenance(session_id: &str, event: &ProvenanceEvent) -> Self {
        let (resource_type, resource_id) = match event {
            ProvenanceEvent::PlanLineRemoved { line_id, .. }
            | ProvenanceEvent::PlanLineOmitted { line_id } => ("plan_line", line_id.clone()),
            ProvenanceEvent::PlanLineSubstituted {
                removed_line_id, ..
            } => ("plan_line", removed_line_id.clone()),
            ProvenanceEvent::DiagnosisOmitted { diagnosis_code } => {
                ("diagnosis", diagnosis_code.clone())
            }
            ProvenanceEvent::RuleConflict { target, .. } => ("safety_target", target.clone()),
            ProvenanceEvent::EvidenceUnavailable { sources, .. } => {
                ("evidence_source", sources.join(","))
            }
            ProvenanceEvent::GenerationFallback { .. } => ("narrative", session_id.to_string()),
        };

        let audit = Self::new(event.action(), resource_type, resource_id, session_id);
        match serde_json::to_value(event) {
            Ok(details) => audit.with_details(details),
            Err(_) => audit,
        }
    }

    /// Emit this audit event via tracing.
    pub fn emit(&self) {
        let details = self
            .details
            .as_ref()
            .map(serde_json::Value::to_string)
            .unwrap_or_default();
        info!(
            audit.action = %self.action,
            audit.resource_type = %self.resource_type,
            audit.resource_id = %self.resource_id,
            audit.session_id = %self.session_id,
            audit.details = %details,
            "audit event"
        );
    }
}
