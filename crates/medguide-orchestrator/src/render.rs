//! Text the engine produces itself: the template summary used both as the
//! phrasing input and as the fallback narrative, disclosure messages and
//! the SOAP note.

use medguide_core::models::differential::DifferentialEntry;
use medguide_core::models::interview::{InterviewState, SoapNote};
use medguide_core::models::plan::PlanLine;
use medguide_core::models::profile::{FieldId, LabCode, PatientProfile, Sex};
use medguide_core::models::risk::RiskAssessment;
use medguide_core::models::safety::SafetyDirective;
use serde::Serialize;
use tera::{Context, Tera};

use crate::error::OrchestratorError;

const SUMMARY_TEMPLATE: &str = include_str!("../templates/summary.txt");
const SUMMARY_NAME: &str = "summary.txt";

pub const SYSTEM_PROMPT: &str = "You are a clinical documentation assistant. \
Rephrase the structured result inside <structured_result> as a short note for a clinician. \
Do not add diagnoses, drugs, doses, measurements or recommendations that are not in the structured result. \
Do not remove or soften any safety instruction. Keep every referral instruction first. \
You may cite the evidence excerpts by their locator. If something is unclear, leave it out.";

pub const DELIVERED_DISCLOSURE: &str = "Decision support for a qualified clinician, computed from \
versioned rule tables and the cited evidence. It is not a diagnosis. Check every recommendation \
against the cited sources and the patient before acting.";

pub const DEGRADED_DISCLOSURE: &str = "Evidence retrieval is unavailable, so no differential or plan \
was produced. The risk and safety results were computed from the rule tables and remain valid.";

pub const WITHHELD_DISCLOSURE: &str = "The result failed an internal consistency check and was \
withheld. Please complete the assessment clinically.";

pub const CLARIFYING_DISCLOSURE: &str = "More information is needed before an assessment can be made.";

pub fn insufficient_disclosure(missing: &[FieldId], detail: Option<&str>) -> String {
    let mut text = String::from("There is not enough information to assess this patient safely.");
    if !missing.is_empty() {
        let names: Vec<&str> = missing.iter().map(|f| field_label(*f)).collect();
        text.push_str(&format!(" Missing: {}.", names.join(", ")));
    }
    if let Some(detail) = detail {
        text.push(' ');
        text.push_str(detail);
    }
    text.push_str(" No diagnosis has been made; a clinician should complete the assessment.");
    text
}

fn field_label(field: FieldId) -> &'static str {
    match field {
        FieldId::Age => "age",
        FieldId::Sex => "sex",
        FieldId::BloodPressure => "blood pressure",
        FieldId::HeartRate => "heart rate",
        FieldId::Bmi => "BMI",
        FieldId::Hba1c => "HbA1c",
        FieldId::FastingGlucose => "fasting glucose",
        FieldId::Potassium => "serum potassium",
        FieldId::Egfr => "eGFR",
        FieldId::Ldl => "LDL cholesterol",
        FieldId::Pregnancy => "pregnancy status",
        FieldId::Smoking => "smoking status",
        FieldId::Medications => "current medications",
        FieldId::Comorbidities => "known conditions",
        FieldId::Symptoms => "symptoms",
    }
}

#[derive(Debug, Serialize)]
struct RiskView {
    label: String,
    bp_stage: Option<String>,
    cardiovascular: Option<String>,
    factors: Vec<String>,
}

#[derive(Debug, Serialize)]
struct DirectiveView {
    severity: String,
    pathway: String,
    message: String,
    action: String,
}

#[derive(Debug, Serialize)]
struct DiagnosisView {
    rank: u32,
    label: String,
    score: f64,
    citations: usize,
}

#[derive(Debug, Serialize)]
struct LineView {
    priority: u32,
    text: String,
    grade: Option<String>,
    substituted_for: Option<String>,
}

#[derive(Debug, Serialize)]
struct SummaryView {
    risk: Option<RiskView>,
    safety: Vec<DirectiveView>,
    differential: Vec<DiagnosisView>,
    plan: Vec<LineView>,
    notices: Vec<String>,
}

/// The computed result as plain text. Nothing here is generated.
pub fn render_summary(
    risk: Option<&RiskAssessment>,
    directives: &[SafetyDirective],
    differential: &[DifferentialEntry],
    plan: &[PlanLine],
    notices: &[String],
) -> Result<String, OrchestratorError> {
    let view = SummaryView {
        risk: risk.map(|r| RiskView {
            label: r.tier.label.clone(),
            bp_stage: r.bp_stage.clone(),
            cardiovascular: r.cardiovascular_risk.map(|c| c.as_str().replace('_', " ")),
            factors: r.contributing_factors.iter().map(|f| f.label.clone()).collect(),
        }),
        safety: directives
            .iter()
            .map(|d| DirectiveView {
                severity: d.severity.as_str().to_string(),
                pathway: d.pathway.as_str().to_string(),
                message: d.message.clone(),
                action: d.required_action.clone(),
            })
            .collect(),
        differential: differential
            .iter()
            .map(|e| DiagnosisView {
                rank: e.rank,
                label: e.label.clone(),
                score: e.score,
                citations: e.supporting_evidence.len(),
            })
            .collect(),
        plan: plan
            .iter()
            .map(|l| LineView {
                priority: l.priority,
                text: l.item.text.clone(),
                grade: l.best_grade().map(|g| g.as_str().to_string()),
                substituted_for: l.substituted_for.clone(),
            })
            .collect(),
        notices: notices.to_vec(),
    };

    let mut tera = Tera::default();
    tera.add_raw_template(SUMMARY_NAME, SUMMARY_TEMPLATE)?;
    let context = Context::from_serialize(&view)?;
    Ok(tera.render(SUMMARY_NAME, &context)?)
}

/// Objective findings as note lines, in a fixed order.
pub fn objective_lines(profile: &PatientProfile) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(age) = profile.age() {
        lines.push(format!("Age: {age}"));
    }
    if let Some(sex) = profile.sex() {
        let sex = match sex {
            Sex::Male => "male",
            Sex::Female => "female",
        };
        lines.push(format!("Sex: {sex}"));
    }
    if let Some(bp) = profile.blood_pressure() {
        lines.push(format!("Blood pressure: {bp}"));
    }
    if let Some(hr) = profile.heart_rate() {
        lines.push(format!("Heart rate: {hr} bpm"));
    }
    if let Some(bmi) = profile.bmi() {
        lines.push(format!("BMI: {bmi:.1}"));
    }
    for (lab, name) in [
        (LabCode::Hba1c, "HbA1c"),
        (LabCode::FastingGlucose, "Fasting glucose"),
        (LabCode::Potassium, "Potassium"),
        (LabCode::Egfr, "eGFR"),
        (LabCode::Ldl, "LDL"),
    ] {
        if let Some(v) = profile.lab(lab) {
            lines.push(format!("{name}: {v} {}", lab.unit()));
        }
    }
    if let Some(pregnant) = profile.pregnant() {
        lines.push(format!("Pregnant: {}", if pregnant { "yes" } else { "no" }));
    }
    if let Some(smoker) = profile.smoker() {
        lines.push(format!("Smoker: {}", if smoker { "yes" } else { "no" }));
    }

    let medications: Vec<&str> = profile.medications().map(|m| m.label.as_str()).collect();
    if !medications.is_empty() {
        lines.push(format!("Medications: {}", medications.join(", ")));
    }
    let conditions: Vec<&str> = profile.comorbidities().collect();
    if !conditions.is_empty() {
        lines.push(format!("Known conditions: {}", conditions.join(", ")));
    }
    for symptom in profile.symptoms() {
        match symptom.onset_hours {
            Some(h) => lines.push(format!("Symptom: {} (onset {h} h ago)", symptom.label)),
            None => lines.push(format!("Symptom: {}", symptom.label)),
        }
    }
    lines
}

pub fn assessment_lines(risk: Option<&RiskAssessment>, differential: &[DifferentialEntry]) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(risk) = risk {
        lines.push(format!("Risk tier: {} ({})", risk.tier.label, risk.table_version));
    }
    for entry in differential {
        lines.push(format!("{}. {} ({:.2})", entry.rank, entry.label, entry.score));
    }
    lines
}

pub fn plan_lines(plan: &[PlanLine]) -> Vec<String> {
    plan.iter()
        .map(|l| format!("{}. {}", l.priority, l.item.text))
        .collect()
}

pub fn soap_note(state: &InterviewState) -> SoapNote {
    SoapNote {
        subjective: state.subjective.join("\n"),
        objective: state.objective.join("\n"),
        assessment: state.assessment.join("\n"),
        plan: state.plan.join("\n"),
    }
}
