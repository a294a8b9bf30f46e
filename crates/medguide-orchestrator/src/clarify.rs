//! Targeted clarification questions.

use std::collections::BTreeSet;

use medguide_core::models::interview::InterviewState;
use medguide_core::models::profile::{FieldId, PatientProfile, Sex};
use medguide_core::models::term::AmbiguityGroup;

use crate::response::Question;

const CHILDBEARING_AGE: std::ops::RangeInclusive<u32> = 12..=55;

/// Required fields the profile lacks. Pregnancy status is required as well
/// for a female patient of childbearing age.
pub fn missing_fields(profile: &PatientProfile, required: &[FieldId]) -> BTreeSet<FieldId> {
    let mut missing: BTreeSet<FieldId> = required
        .iter()
        .copied()
        .filter(|f| !profile.is_known(*f))
        .collect();

    let childbearing = profile.sex() == Some(Sex::Female)
        && profile.age().is_some_and(|a| CHILDBEARING_AGE.contains(&a));
    if childbearing && !profile.is_known(FieldId::Pregnancy) {
        missing.insert(FieldId::Pregnancy);
    }
    missing
}

pub fn field_key(field: FieldId) -> String {
    format!("field:{field}")
}

pub fn ambiguity_key(group: &AmbiguityGroup) -> String {
    format!("ambiguity:{}", group.matched_text.to_lowercase())
}

/// The next question worth asking: open ambiguities first, then missing
/// fields in declaration order. Keys already asked `max_rounds` times are
/// skipped.
pub fn next_question(state: &InterviewState, missing: &BTreeSet<FieldId>, max_rounds: u32) -> Option<Question> {
    for group in &state.pending_ambiguities {
        let key = ambiguity_key(group);
        if state.times_asked(&key) < max_rounds {
            return Some(Question {
                key,
                text: ambiguity_question(group),
            });
        }
    }

    missing.iter().find_map(|field| {
        let key = field_key(*field);
        (state.times_asked(&key) < max_rounds).then(|| Question {
            key,
            text: field_question(*field).to_string(),
        })
    })
}

/// Missing fields whose clarification budget is used up.
pub fn exhausted(state: &InterviewState, missing: &BTreeSet<FieldId>, max_rounds: u32) -> Vec<FieldId> {
    missing
        .iter()
        .copied()
        .filter(|f| state.times_asked(&field_key(*f)) >= max_rounds)
        .collect()
}

fn ambiguity_question(group: &AmbiguityGroup) -> String {
    let options: Vec<&str> = group.candidates.iter().map(|c| c.label.as_str()).collect();
    let choices = match options.as_slice() {
        [] => String::new(),
        [only] => (*only).to_string(),
        [init @ .., last] => format!("{} or {}", init.join(", "), last),
    };
    format!("When you said \"{}\", did you mean {}?", group.matched_text, choices)
}

pub fn field_question(field: FieldId) -> &'static str {
    match field {
        FieldId::Age => "How old is the patient?",
        FieldId::Sex => "What is the patient's sex?",
        FieldId::BloodPressure => {
            "What is the patient's most recent blood pressure reading (systolic/diastolic in mmHg)?"
        }
        FieldId::HeartRate => "What is the patient's resting heart rate?",
        FieldId::Bmi => "What are the patient's height and weight, or BMI?",
        FieldId::Hba1c => "What was the most recent HbA1c result?",
        FieldId::FastingGlucose => "What was the most recent fasting glucose in mmol/L?",
        FieldId::Potassium => "What was the most recent serum potassium in mmol/L?",
        FieldId::Egfr => "What was the most recent eGFR?",
        FieldId::Ldl => "What was the most recent LDL cholesterol in mmol/L?",
        FieldId::Pregnancy => "Is the patient currently pregnant?",
        FieldId::Smoking => "Does the patient smoke?",
        FieldId::Medications => "Which medications is the patient currently taking?",
        FieldId::Comorbidities => {
            "Does the patient have any known chronic conditions, such as diabetes or kidney disease?"
        }
        FieldId::Symptoms => "Which symptoms is the patient experiencing, and since when?",
    }
}
