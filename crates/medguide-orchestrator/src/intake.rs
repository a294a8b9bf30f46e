//! Folding one turn's utterance and structured fields into the profile.

use medguide_core::models::interview::InterviewState;
use medguide_core::models::profile::{
    FieldId, LabCode, Medication, PatientProfile, ProfileWriter, Symptom, TurnId,
};
use medguide_core::models::term::{AmbiguityGroup, TermCategory};
use medguide_evidence::PatientChart;
use medguide_terms::{extract_facts, Lexicon, Normalization, Normalizer};
use tracing::{debug, warn};

use crate::response::StructuredFields;

#[derive(Debug, Clone)]
pub struct IntakeOutcome {
    pub normalization: Normalization,
    pub changed: Vec<FieldId>,
}

/// Applies extracted measurements, asserted terms and then the structured
/// fields, so a structured value wins over one read from the same text.
/// Negated and ambiguous terms are never recorded.
pub fn apply(
    profile: &mut PatientProfile,
    turn: TurnId,
    at: jiff::Timestamp,
    normalizer: &Normalizer,
    utterance: &str,
    fields: &StructuredFields,
) -> IntakeOutcome {
    let normalization = normalizer.normalize(utterance);
    let facts = extract_facts(utterance);
    let lexicon = normalizer.lexicon();

    let mut writer = profile.writer(turn, at);

    if let Some(age) = facts.age {
        writer.age(age);
    }
    if let Some(sex) = facts.sex {
        writer.sex(sex);
    }
    match (facts.systolic, facts.diastolic) {
        (Some(s), Some(d)) => {
            writer.blood_pressure(s, d);
        }
        (Some(s), None) => {
            writer.systolic(s);
        }
        _ => {}
    }
    if let Some(hr) = facts.heart_rate {
        writer.heart_rate(hr);
    }
    if let Some(bmi) = facts.bmi {
        writer.bmi(bmi);
    }
    for (lab, value) in [
        (LabCode::Hba1c, facts.hba1c),
        (LabCode::FastingGlucose, facts.fasting_glucose),
        (LabCode::Potassium, facts.potassium),
        (LabCode::Egfr, facts.egfr),
    ] {
        if let Some(v) = value {
            writer.lab(lab, v);
        }
    }
    if let Some(pregnant) = facts.pregnant {
        writer.pregnant(pregnant);
    }
    if let Some(smoker) = facts.smoker {
        writer.smoker(smoker);
    }

    for term in &normalization.terms {
        if term.negated || normalization.is_ambiguous(&term.span) {
            continue;
        }
        match term.category {
            TermCategory::Condition => {
                writer.comorbidity(term.code.clone());
            }
            TermCategory::Symptom => {
                writer.symptom(Symptom {
                    code: term.code.clone(),
                    label: term.label.clone(),
                    onset_hours: facts.onset_hours,
                });
            }
            TermCategory::Drug | TermCategory::DrugClass => {
                writer.medication(Medication {
                    code: term.code.clone(),
                    label: term.label.clone(),
                    drug_class: term.drug_class.clone(),
                });
            }
            // smoking status comes from the extractor, which sees negation
            // phrases like "quit smoking"
            TermCategory::Finding if term.code == "finding:smoking" => {}
            TermCategory::Finding => {
                writer.comorbidity(term.code.clone());
            }
            TermCategory::Lab => {}
        }
    }

    apply_structured(&mut writer, lexicon, fields);

    let changed = writer.changed();
    debug!(
        turn = turn.0,
        terms = normalization.terms.len(),
        ambiguities = normalization.ambiguities.len(),
        changed = ?changed,
        "intake applied"
    );
    IntakeOutcome {
        normalization,
        changed,
    }
}

fn apply_structured(
    writer: &mut ProfileWriter<'_>,
    lexicon: &Lexicon,
    fields: &StructuredFields,
) {
    if let Some(age) = fields.age {
        writer.age(age);
    }
    if let Some(sex) = fields.sex {
        writer.sex(sex);
    }
    match (fields.systolic, fields.diastolic) {
        (Some(s), Some(d)) => {
            writer.blood_pressure(s, d);
        }
        (Some(s), None) => {
            writer.systolic(s);
        }
        (None, Some(_)) => warn!("diastolic reading without systolic ignored"),
        (None, None) => {}
    }
    if let Some(hr) = fields.heart_rate {
        writer.heart_rate(hr);
    }
    if let Some(bmi) = fields.bmi {
        writer.bmi(bmi);
    }
    for (lab, value) in [
        (LabCode::Hba1c, fields.hba1c),
        (LabCode::FastingGlucose, fields.fasting_glucose),
        (LabCode::Potassium, fields.potassium),
        (LabCode::Egfr, fields.egfr),
        (LabCode::Ldl, fields.ldl),
    ] {
        if let Some(v) = value {
            writer.lab(lab, v);
        }
    }
    if let Some(pregnant) = fields.pregnant {
        writer.pregnant(pregnant);
    }
    if let Some(smoker) = fields.smoker {
        writer.smoker(smoker);
    }

    for code in &fields.medications {
        let medication = match lexicon.entry(code) {
            Some(entry) => Medication {
                code: entry.code.clone(),
                label: entry.label.clone(),
                drug_class: entry.drug_class.clone(),
            },
            None => {
                warn!(code = %code, "medication code not in lexicon; recorded without class");
                Medication {
                    code: code.clone(),
                    label: code.clone(),
                    drug_class: None,
                }
            }
        };
        writer.medication(medication);
    }
    for code in &fields.comorbidities {
        writer.comorbidity(code.clone());
    }
    for symptom in &fields.symptoms {
        let label = lexicon
            .entry(&symptom.code)
            .map(|e| e.label.clone())
            .unwrap_or_else(|| symptom.code.clone());
        writer.symptom(Symptom {
            code: symptom.code.clone(),
            label,
            onset_hours: symptom.onset_hours,
        });
    }
}

/// Drops pending ambiguity groups that this turn settled and queues the
/// new ones. A group is settled once any of its candidate codes is
/// asserted or already on the profile.
pub fn reconcile_ambiguities(state: &mut InterviewState, normalization: &Normalization, profile: &PatientProfile) {
    let asserted = normalization.asserted_codes();
    let settled = |group: &AmbiguityGroup| {
        group.candidates.iter().any(|c| {
            let code = c.code.as_str();
            asserted.contains(&code)
                || profile.has_comorbidity(code)
                || profile.symptoms().any(|s| s.code == code)
                || profile.medications().any(|m| m.code == code)
        })
    };

    state.pending_ambiguities.retain(|group| !settled(group));

    for group in &normalization.ambiguities {
        let key = group.matched_text.to_lowercase();
        let already_pending = state
            .pending_ambiguities
            .iter()
            .any(|g| g.matched_text.to_lowercase() == key);
        if !already_pending && !settled(group) {
            state.pending_ambiguities.push(group.clone());
        }
    }
}

/// Seeds a fresh profile from the patient's chart. Every fact is written at
/// [`TurnId::CHART`] and keeps the locator of the row it came from.
pub fn seed_from_chart(profile: &mut PatientProfile, chart: &PatientChart, at: jiff::Timestamp) -> Vec<FieldId> {
    let mut writer = profile.writer(TurnId::CHART, at);

    writer.from_record(chart.locator());
    if let Some(age) = chart.age {
        writer.age(age);
    }
    if let Some(sex) = chart.sex {
        writer.sex(sex);
    }
    if let Some(bmi) = chart.effective_bmi() {
        writer.bmi(bmi);
    }
    if let Some(smoker) = chart.smoker {
        writer.smoker(smoker);
    }

    if let Some(vitals) = &chart.vitals {
        writer.from_record(vitals.locator());
        writer.blood_pressure(vitals.systolic, vitals.diastolic);
        if let Some(hr) = vitals.heart_rate {
            writer.heart_rate(hr);
        }
    }
    for diagnosis in &chart.diagnoses {
        writer.from_record(diagnosis.locator()).comorbidity(diagnosis.code.clone());
    }
    for medication in &chart.medications {
        writer.from_record(medication.locator()).medication(Medication {
            code: medication.code.clone(),
            label: medication.label.clone(),
            drug_class: medication.drug_class.clone(),
        });
    }
    for lab in &chart.labs {
        writer.from_record(lab.locator()).lab(lab.lab, lab.value);
    }

    let changed = writer.changed();
    debug!(patient_id = %chart.patient_id, changed = ?changed, "profile seeded from chart");
    changed
}
