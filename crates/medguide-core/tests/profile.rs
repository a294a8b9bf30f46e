use medguide_core::models::evidence::Locator;
use medguide_core::models::interview::{InterviewPhase, InterviewState};
use medguide_core::models::profile::{FieldId, LabCode, Medication, PatientProfile, Sex, Symptom, TurnId};
use medguide_core::models::safety::{
    sort_for_display, DirectiveTarget, Pathway, SafetyDirective, Severity,
};

fn at(secs: i64) -> jiff::Timestamp {
    jiff::Timestamp::from_second(1_700_000_000 + secs).unwrap()
}

#[test]
fn updates_record_source_turn_and_keep_history() {
    let mut profile = PatientProfile::new("p-1");
    profile.writer(TurnId(1), at(0)).blood_pressure(150, 92).age(58);
    profile.writer(TurnId(2), at(60)).blood_pressure(168, 98);

    assert_eq!(profile.blood_pressure().unwrap().systolic, 168);
    assert_eq!(profile.source_turn(FieldId::BloodPressure), Some(TurnId(2)));
    assert_eq!(profile.source_turn(FieldId::Age), Some(TurnId(1)));

    let bp_updates: Vec<_> = profile
        .history()
        .iter()
        .filter(|u| u.field == FieldId::BloodPressure)
        .collect();
    assert_eq!(bp_updates.len(), 2);
    assert!(bp_updates[0].previous.is_none());
    assert_eq!(
        bp_updates[1].previous.as_ref().unwrap()["systolic"],
        serde_json::json!(150)
    );
}

#[test]
fn chart_facts_carry_their_record_locator() {
    let mut profile = PatientProfile::new("p-1");
    let info = Locator::Relational {
        table: "patient_info".to_string(),
        key_column: "patient_id".to_string(),
        key: "p-1".to_string(),
    };
    profile
        .writer(TurnId::CHART, at(0))
        .from_record(info.clone())
        .age(61)
        .sex(Sex::Male);
    profile.writer(TurnId(1), at(60)).blood_pressure(150, 92);

    assert_eq!(profile.source_turn(FieldId::Age), Some(TurnId::CHART));
    let history = profile.history();
    assert_eq!(history.len(), 3);
    assert_eq!(history[0].source.as_ref(), Some(&info));
    assert_eq!(history[1].source.as_ref(), Some(&info));
    assert!(history[2].source.is_none());
    assert!(serde_json::to_value(&history[2]).unwrap().get("source").is_none());
}

#[test]
fn repeating_a_value_does_not_grow_history() {
    let mut profile = PatientProfile::new("p-1");
    profile.writer(TurnId(1), at(0)).age(40).sex(Sex::Female);
    let before = profile.history().len();
    let changed = {
        let mut w = profile.writer(TurnId(2), at(5));
        w.age(40).sex(Sex::Female);
        w.changed()
    };
    assert!(changed.is_empty());
    assert_eq!(profile.history().len(), before);
    assert_eq!(profile.source_turn(FieldId::Age), Some(TurnId(1)));
}

#[test]
fn list_fields_deduplicate_by_code() {
    let mut profile = PatientProfile::new("p-1");
    let med = Medication {
        code: "drug:enalapril".to_string(),
        label: "enalapril".to_string(),
        drug_class: Some("acei".to_string()),
    };
    profile
        .writer(TurnId(1), at(0))
        .medication(med.clone())
        .medication(med)
        .comorbidity("cond:t2dm")
        .comorbidity("cond:t2dm")
        .lab(LabCode::Hba1c, 7.8);

    assert_eq!(profile.medications().count(), 1);
    assert_eq!(profile.comorbidities().count(), 1);
    assert_eq!(profile.lab(LabCode::Hba1c), Some(7.8));
    assert!(profile.is_known(FieldId::Medications));
    assert!(!profile.is_known(FieldId::Symptoms));
}

#[test]
fn symptom_onset_is_refreshed_not_duplicated() {
    let mut profile = PatientProfile::new("p-1");
    let headache = |onset| Symptom {
        code: "sym:headache".to_string(),
        label: "headache".to_string(),
        onset_hours: onset,
    };
    profile.writer(TurnId(1), at(0)).symptom(headache(None));
    profile.writer(TurnId(2), at(10)).symptom(headache(Some(3.0)));
    profile.writer(TurnId(3), at(20)).symptom(headache(None));

    let symptoms: Vec<_> = profile.symptoms().collect();
    assert_eq!(symptoms.len(), 1);
    assert_eq!(symptoms[0].onset_hours, Some(3.0));
}

#[test]
fn interview_rejects_edges_outside_the_turn_cycle() {
    let mut state = InterviewState::new();
    assert_eq!(state.phase(), InterviewPhase::Intake);
    assert!(state.transition(InterviewPhase::Delivered).is_err());
    state.transition(InterviewPhase::Assessing).unwrap();
    state.transition(InterviewPhase::Drafting).unwrap();
    state.transition(InterviewPhase::SafetyGating).unwrap();
    state.transition(InterviewPhase::Delivered).unwrap();
    assert!(state.phase().is_terminal());
    assert!(state.transition(InterviewPhase::Assessing).is_err());
    state.transition(InterviewPhase::Intake).unwrap();
}

#[test]
fn interrupted_pass_restarts_at_intake() {
    for stop in [InterviewPhase::Assessing, InterviewPhase::Drafting, InterviewPhase::SafetyGating] {
        let mut state = InterviewState::new();
        state.transition(InterviewPhase::Assessing).unwrap();
        if stop != InterviewPhase::Assessing {
            state.transition(InterviewPhase::Drafting).unwrap();
        }
        if stop == InterviewPhase::SafetyGating {
            state.transition(InterviewPhase::SafetyGating).unwrap();
        }
        assert_eq!(state.phase(), stop);
        assert!(stop.is_interrupted());
        state.transition(InterviewPhase::Intake).unwrap();
    }
    assert!(!InterviewPhase::Clarifying.is_interrupted());
    assert!(!InterviewPhase::Delivered.is_interrupted());
}

fn directive(severity: Severity, pathway: Pathway, priority: u32, id: &str) -> SafetyDirective {
    SafetyDirective {
        severity,
        trigger_rule_id: id.to_string(),
        message: String::new(),
        required_action: String::new(),
        pathway,
        priority,
        target: None,
        substitute_excluding: Vec::new(),
    }
}

#[test]
fn directives_sort_by_severity_then_pathway_then_priority() {
    let mut directives = vec![
        directive(Severity::Warn, Pathway::Routine, 1, "warn-elderly"),
        directive(Severity::Refer, Pathway::Specialist, 1, "refer-specialist"),
        directive(Severity::Block, Pathway::Routine, 5, "block-b"),
        directive(Severity::Refer, Pathway::Emergency, 9, "refer-emergency"),
        directive(Severity::Block, Pathway::Routine, 2, "block-a"),
        directive(Severity::Refer, Pathway::Obstetric, 1, "refer-obstetric"),
    ];
    sort_for_display(&mut directives);
    let ids: Vec<_> = directives.iter().map(|d| d.trigger_rule_id.as_str()).collect();
    assert_eq!(
        ids,
        [
            "refer-emergency",
            "refer-obstetric",
            "refer-specialist",
            "block-a",
            "block-b",
            "warn-elderly",
        ]
    );
}

#[test]
fn equal_directives_fall_back_to_target() {
    let mut a = directive(Severity::Block, Pathway::Routine, 1, "same");
    a.target = Some(DirectiveTarget::PlanLine {
        line_id: "tx-b".to_string(),
    });
    let mut b = a.clone();
    b.target = Some(DirectiveTarget::PlanLine {
        line_id: "tx-a".to_string(),
    });
    let mut directives = vec![a, b];
    sort_for_display(&mut directives);
    assert!(directives[0].targets_line("tx-a"));
}
