mod common;

use std::sync::Arc;

use common::{engine_with_config, record_store, records, test_config};
use medguide_core::models::evidence::Locator;
use medguide_core::models::interview::InterviewPhase;
use medguide_core::models::profile::{FieldId, LabCode, Sex, TurnId};
use medguide_evidence::{ChartDiagnosis, ChartLab, ChartMedication, ChartVitals, InMemoryRecordStore, PatientChart};
use medguide_orchestrator::{Engine, NoticeKind, OrchestratorError, TurnRequest};

fn chart(patient_id: &str) -> PatientChart {
    PatientChart {
        patient_id: patient_id.to_string(),
        age: None,
        sex: None,
        height_cm: None,
        weight_kg: None,
        bmi: None,
        smoker: None,
        diagnoses: Vec::new(),
        medications: Vec::new(),
        labs: Vec::new(),
        vitals: None,
        updated_at: None,
    }
}

fn diabetic_man() -> PatientChart {
    PatientChart {
        age: Some(58),
        sex: Some(Sex::Male),
        bmi: Some(28.5),
        vitals: Some(ChartVitals {
            assessment_id: "a-9".to_string(),
            systolic: 168,
            diastolic: 98,
            heart_rate: Some(76),
        }),
        diagnoses: vec![ChartDiagnosis {
            diag_id: "d-3".to_string(),
            code: "cond:t2dm".to_string(),
        }],
        ..chart("p-200")
    }
}

fn elderly_woman_on_raas() -> PatientChart {
    PatientChart {
        age: Some(70),
        sex: Some(Sex::Female),
        height_cm: Some(160.0),
        weight_kg: Some(64.0),
        vitals: Some(ChartVitals {
            assessment_id: "a-12".to_string(),
            systolic: 150,
            diastolic: 92,
            heart_rate: None,
        }),
        medications: vec![
            ChartMedication {
                med_id: "m-4".to_string(),
                code: "drug:enalapril".to_string(),
                label: "enalapril".to_string(),
                drug_class: Some("acei".to_string()),
            },
            ChartMedication {
                med_id: "m-5".to_string(),
                code: "drug:spironolactone".to_string(),
                label: "spironolactone".to_string(),
                drug_class: Some("k_sparing_diuretic".to_string()),
            },
        ],
        labs: vec![ChartLab {
            result_id: "l-7".to_string(),
            lab: LabCode::Egfr,
            value: 45.0,
        }],
        ..chart("p-201")
    }
}

fn charted_engine(patients: Arc<InMemoryRecordStore>) -> Engine {
    engine_with_config(test_config(), record_store()).with_patient_records(patients)
}

fn chart_store() -> Arc<InMemoryRecordStore> {
    Arc::new(InMemoryRecordStore::new(records()).with_charts(vec![diabetic_man(), elderly_woman_on_raas()]))
}

#[tokio::test]
async fn charted_patient_is_not_asked_what_the_chart_knows() {
    let engine = charted_engine(chart_store());
    let session = engine.start_session("p-200").await;

    let response = engine
        .handle_turn(TurnRequest::new(&session, "routine review"))
        .await
        .unwrap();

    assert_eq!(response.turn, TurnId(1));
    assert_eq!(response.state, InterviewPhase::Delivered);
    assert!(response.question.is_none());
    assert!(!response.plan.is_empty());
    assert!(!response.has_notice(NoticeKind::ChartUnavailable));
    let risk = response.risk_assessment.as_ref().unwrap();
    assert_eq!(risk.bp_stage.as_deref(), Some("stage_2"));

    let archive = engine.end_session(&session).unwrap();
    let bp = archive
        .profile_history
        .iter()
        .find(|u| u.field == FieldId::BloodPressure)
        .unwrap();
    assert_eq!(bp.source_turn, TurnId::CHART);
    assert_eq!(
        bp.source.as_ref().map(Locator::to_string).as_deref(),
        Some("rel://hypertension_risk_assessment/assessment_id=a-9")
    );
    let age = archive.profile_history.iter().find(|u| u.field == FieldId::Age).unwrap();
    assert_eq!(
        age.source.as_ref().map(Locator::to_string).as_deref(),
        Some("rel://patient_info/patient_id=p-200")
    );
}

#[tokio::test]
async fn patient_reported_values_override_the_chart() {
    let engine = charted_engine(chart_store());
    let session = engine.start_session("p-200").await;

    engine
        .handle_turn(TurnRequest::new(&session, "blood pressure today 142/88"))
        .await
        .unwrap();

    let archive = engine.end_session(&session).unwrap();
    let readings: Vec<_> = archive
        .profile_history
        .iter()
        .filter(|u| u.field == FieldId::BloodPressure)
        .collect();
    assert_eq!(readings.len(), 2);
    assert_eq!(readings[1].source_turn, TurnId(1));
    assert!(readings[1].source.is_none());
    assert!(readings[1].previous.is_some());
}

#[tokio::test]
async fn patient_without_a_chart_starts_empty() {
    let engine = charted_engine(chart_store());
    let session = engine.start_session("p-999").await;

    let response = engine
        .handle_turn(TurnRequest::new(&session, "patient with high blood pressure"))
        .await
        .unwrap();

    assert_eq!(response.state, InterviewPhase::Clarifying);
    assert_eq!(response.question.as_ref().unwrap().key, "field:age");
    assert!(!response.has_notice(NoticeKind::ChartUnavailable));
}

#[tokio::test]
async fn unreadable_chart_is_reported_once() {
    let patients = chart_store();
    patients.set_offline(true);
    let engine = charted_engine(patients);
    let session = engine.start_session("p-200").await;

    let first = engine
        .handle_turn(TurnRequest::new(&session, "patient with high blood pressure"))
        .await
        .unwrap();
    assert_eq!(first.state, InterviewPhase::Clarifying);
    assert_eq!(first.question.as_ref().unwrap().key, "field:age");
    assert!(first.has_notice(NoticeKind::ChartUnavailable));

    let second = engine
        .handle_turn(TurnRequest::new(&session, "he is 58"))
        .await
        .unwrap();
    assert!(!second.has_notice(NoticeKind::ChartUnavailable));
}

#[tokio::test]
async fn review_reports_risk_and_medication_safety() {
    let engine = charted_engine(chart_store());

    let review = engine.review_patient("p-201").await.unwrap();

    assert_eq!(review.patient_id, "p-201");
    assert_eq!(review.profile.bmi(), Some(25.0));
    assert_eq!(review.risk_assessment.bp_stage.as_deref(), Some("stage_1"));
    let rules: Vec<&str> = review
        .safety_directives
        .iter()
        .map(|d| d.trigger_rule_id.as_str())
        .collect();
    assert!(rules.contains(&"interaction-raas-potassium-sparing-current"));
    assert!(rules.contains(&"elderly-caution"));
    assert!(rules.contains(&"renal-impairment-caution"));
    assert!(review.safety_report.contains("elderly-caution"));
    assert_eq!(engine.session_count(), 0);
}

#[tokio::test]
async fn review_of_unknown_patient_fails() {
    let engine = charted_engine(chart_store());

    let err = engine.review_patient("p-999").await.unwrap_err();
    assert!(matches!(err, OrchestratorError::PatientNotFound(id) if id == "p-999"));
}

#[tokio::test]
async fn review_needs_a_record_store() {
    let engine = engine_with_config(test_config(), record_store());

    let err = engine.review_patient("p-200").await.unwrap_err();
    assert!(matches!(err, OrchestratorError::PatientNotFound(_)));
}
