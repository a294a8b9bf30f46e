use medguide_core::models::plan::{PlanCategory, PlanItem};
use medguide_core::models::profile::{FieldId, PatientProfile, Sex, Symptom, TurnId};
use medguide_core::{Condition, ConditionContext};

fn profile() -> PatientProfile {
    let mut p = PatientProfile::new("p");
    p.writer(TurnId(1), jiff::Timestamp::UNIX_EPOCH)
        .age(35)
        .sex(Sex::Female)
        .pregnant(true)
        .blood_pressure(158, 96)
        .symptom(Symptom {
            code: "sym:headache".to_string(),
            label: "headache".to_string(),
            onset_hours: Some(30.0),
        });
    p
}

#[test]
fn conditions_deserialize_from_rule_table_json() {
    let json = r#"{
        "type": "all",
        "of": [
            { "type": "pregnant" },
            { "type": "plan_item_class", "classes": ["acei", "arb"] }
        ]
    }"#;
    let condition: Condition = serde_json::from_str(json).unwrap();
    let p = profile();
    let item = PlanItem {
        line_id: "tx-acei".to_string(),
        category: PlanCategory::Antihypertensive,
        drug_class: Some("acei".to_string()),
        drug: None,
        text: "ACE inhibitor".to_string(),
    };
    assert!(condition.evaluate(&ConditionContext::for_profile(&p).with_plan_item(&item)));
    assert!(!condition.evaluate(&ConditionContext::for_profile(&p)));
}

#[test]
fn missing_inputs_evaluate_false() {
    let empty = PatientProfile::new("p");
    let ctx = ConditionContext::for_profile(&empty);
    assert!(!Condition::SystolicAtLeast { mmhg: 140 }.evaluate(&ctx));
    assert!(!Condition::Pregnant.evaluate(&ctx));
    assert!(Condition::Not { of: Box::new(Condition::Pregnant) }.evaluate(&ctx));
    assert!(!Condition::Known { field: FieldId::Age }.evaluate(&ctx));
}

#[test]
fn symptom_window_uses_onset_hours() {
    let p = profile();
    let ctx = ConditionContext::for_profile(&p);
    let within_day = Condition::Symptom {
        codes: vec!["sym:headache".to_string()],
        within_hours: Some(24.0),
    };
    let within_two_days = Condition::Symptom {
        codes: vec!["sym:headache".to_string()],
        within_hours: Some(48.0),
    };
    assert!(!within_day.evaluate(&ctx));
    assert!(within_two_days.evaluate(&ctx));
}

#[test]
fn either_pressure_floor_satisfies_threshold() {
    let p = profile();
    let ctx = ConditionContext::for_profile(&p);
    assert!(Condition::BloodPressureAtLeast { systolic: 180, diastolic: 95 }.evaluate(&ctx));
    assert!(!Condition::BloodPressureAtLeast { systolic: 180, diastolic: 110 }.evaluate(&ctx));
}

#[test]
fn fields_lists_profile_inputs() {
    let condition = Condition::All {
        of: vec![
            Condition::Sex { sex: Sex::Male },
            Condition::AgeAtLeast { years: 55 },
            Condition::PlanItemClass { classes: vec![] },
        ],
    };
    assert_eq!(condition.fields(), vec![FieldId::Age, FieldId::Sex]);
}
