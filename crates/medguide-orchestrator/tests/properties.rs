mod common;

use std::collections::BTreeSet;
use std::sync::LazyLock;

use medguide_core::models::evidence::EvidenceId;
use medguide_core::models::interview::InterviewPhase;
use medguide_core::models::plan::PlanCategory;
use medguide_core::models::profile::Sex;
use medguide_core::models::safety::Severity;
use medguide_orchestrator::{Engine, StructuredFields, SymptomInput, TurnRequest, TurnResponse};
use proptest::prelude::*;

static RUNTIME: LazyLock<tokio::runtime::Runtime> = LazyLock::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap()
});

static ENGINE: LazyLock<Engine> = LazyLock::new(common::engine);

fn fields() -> impl Strategy<Value = StructuredFields> {
    (
        18u32..90,
        any::<bool>(),
        any::<bool>(),
        (90u32..230, 50u32..135),
        proptest::option::of(17.0f64..42.0),
        any::<bool>(),
        proptest::option::of(1.0f64..120.0),
    )
        .prop_map(|(age, female, pregnant, (systolic, diastolic), bmi, diabetic, headache)| StructuredFields {
            age: Some(age),
            sex: Some(if female { Sex::Female } else { Sex::Male }),
            systolic: Some(systolic),
            diastolic: Some(diastolic),
            bmi,
            pregnant: female.then_some(pregnant),
            comorbidities: if diabetic { vec!["cond:t2dm".to_string()] } else { Vec::new() },
            symptoms: headache
                .map(|h| SymptomInput {
                    code: "sym:headache".to_string(),
                    onset_hours: Some(h),
                })
                .into_iter()
                .collect(),
            ..StructuredFields::default()
        })
}

fn run(fields: StructuredFields) -> TurnResponse {
    let session = RUNTIME.block_on(ENGINE.start_session("prop"));
    let response = RUNTIME
        .block_on(ENGINE.handle_turn(TurnRequest::new(&session, "").with_fields(fields)))
        .unwrap();
    ENGINE.end_session(&session).unwrap();
    response
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn differential_is_cited_or_absent(fields in fields()) {
        let response = run(fields);
        match response.state {
            InterviewPhase::Delivered => {
                prop_assert!(response.differential.len() >= ENGINE.config().min_differential);
                let surfaced: BTreeSet<EvidenceId> = response.provenance.iter().map(|i| i.id()).collect();
                for entry in &response.differential {
                    prop_assert!(!entry.supporting_evidence.is_empty());
                    prop_assert!(entry.supporting_evidence.is_subset(&surfaced));
                }
                for line in &response.plan {
                    prop_assert!(!line.provenance.is_empty());
                }
            }
            InterviewPhase::Insufficient | InterviewPhase::Error => {
                prop_assert!(response.differential.is_empty());
                prop_assert!(response.plan.is_empty());
            }
            other => prop_assert!(false, "unexpected state {other:?}"),
        }
    }

    #[test]
    fn blocked_lines_never_survive(fields in fields()) {
        let response = run(fields);
        for directive in response.safety_directives.iter().filter(|d| d.severity == Severity::Block) {
            for line in &response.plan {
                prop_assert!(!directive.targets_line(line.line_id()), "{} kept despite {}", line.line_id(), directive.trigger_rule_id);
            }
        }
    }

    #[test]
    fn referrals_lead_the_plan(fields in fields()) {
        let response = run(fields);
        let referrals = response
            .safety_directives
            .iter()
            .filter(|d| d.severity == Severity::Refer)
            .count();
        if response.state == InterviewPhase::Delivered {
            let leading = response
                .plan
                .iter()
                .take_while(|l| l.item.category == PlanCategory::Instruction)
                .count();
            prop_assert_eq!(leading, referrals);
            let priorities: Vec<u32> = response.plan.iter().map(|l| l.priority).collect();
            prop_assert_eq!(priorities, (1..=response.plan.len() as u32).collect::<Vec<u32>>());
        }
    }
}
