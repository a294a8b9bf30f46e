use medguide_audit::AuditEvent;
use medguide_core::models::provenance::ProvenanceEvent;
use medguide_core::models::safety::Severity;

#[test]
fn removal_is_audited_against_the_plan_line() {
    let event = ProvenanceEvent::PlanLineRemoved {
        line_id: "ah-acei".to_string(),
        rule_id: "pregnancy-acei-arb".to_string(),
        reason: "contraindicated in pregnancy".to_string(),
    };
    let audit = AuditEvent::from_provenance("s-1", &event);

    assert_eq!(audit.action, "plan_line_removed");
    assert_eq!(audit.resource_type, "plan_line");
    assert_eq!(audit.resource_id, "ah-acei");
    assert_eq!(audit.session_id, "s-1");
    let details = audit.details.unwrap();
    assert_eq!(details["event"], "plan_line_removed");
    assert_eq!(details["rule_id"], "pregnancy-acei-arb");
}

#[test]
fn conflicts_and_outages_name_their_resource() {
    let conflict = AuditEvent::from_provenance(
        "s-2",
        &ProvenanceEvent::RuleConflict {
            target: "ah-acei".to_string(),
            rule_ids: vec!["a".to_string(), "b".to_string()],
            effective: Severity::Block,
        },
    );
    assert_eq!(conflict.resource_type, "safety_target");
    assert_eq!(conflict.details.unwrap()["effective"], "block");

    let outage = AuditEvent::from_provenance(
        "s-2",
        &ProvenanceEvent::EvidenceUnavailable {
            sources: vec!["records".to_string(), "statistics".to_string()],
            reason: "connection refused".to_string(),
        },
    );
    assert_eq!(outage.action, "evidence_unavailable");
    assert_eq!(outage.resource_id, "records,statistics");
}

#[test]
fn manual_events_start_without_details() {
    let audit = AuditEvent::new("session_created", "session", "s-3", "s-3");
    assert!(audit.details.is_none());
    let audit = audit.with_details(serde_json::json!({ "patient": "p-1" }));
    assert_eq!(audit.details.unwrap()["patient"], "p-1");
}
