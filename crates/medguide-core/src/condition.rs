//! Declarative predicates that rule tables are written in.
//!
//! A `Condition` is pure data (deserialized from a rule table) and is
//! evaluated against a [`ConditionContext`]. A leaf whose input is missing
//! from the profile evaluates to `false`; rules that must distinguish
//! "absent" from "false" say so with [`Condition::Known`].

use serde::{Deserialize, Serialize};

use crate::models::plan::{PlanCategory, PlanItem};
use crate::models::profile::{FieldId, LabCode, Medication, PatientProfile, Sex};
use crate::models::risk::{CardiovascularRisk, GlycemicControl, RiskAssessment};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    Always,
    All { of: Vec<Condition> },
    Any { of: Vec<Condition> },
    Not { of: Box<Condition> },
    Known { field: FieldId },
    AgeAtLeast { years: u32 },
    AgeBelow { years: u32 },
    Sex { sex: Sex },
    Pregnant,
    Smoker,
    SystolicAtLeast { mmhg: u32 },
    DiastolicAtLeast { mmhg: u32 },
    /// Systolic or diastolic floor met.
    BloodPressureAtLeast { systolic: u32, diastolic: u32 },
    HeartRateBelow { bpm: u32 },
    BmiAtLeast { value: f64 },
    LabAtLeast { lab: LabCode, value: f64 },
    LabAbove { lab: LabCode, value: f64 },
    LabBelow { lab: LabCode, value: f64 },
    Comorbidity { codes: Vec<String> },
    /// Any listed symptom present. With `within_hours`, the onset must be at
    /// most that many hours ago; an unreported onset counts as recent.
    Symptom {
        codes: Vec<String>,
        #[serde(default)]
        within_hours: Option<f64>,
    },
    TakingDrugClass { classes: Vec<String> },
    TakingDrug { codes: Vec<String> },
    PlanItemClass { classes: Vec<String> },
    /// The medication under evaluation belongs to one of the classes.
    MedicationClass { classes: Vec<String> },
    PlanItemCategory { categories: Vec<PlanCategory> },
    BpStage { stages: Vec<String> },
    GlycemicControl { levels: Vec<GlycemicControl> },
    CardiovascularRiskAtLeast { level: CardiovascularRisk },
}

/// Inputs a condition can look at.
#[derive(Debug, Clone, Copy)]
pub struct ConditionContext<'a> {
    pub profile: &'a PatientProfile,
    pub plan_item: Option<&'a PlanItem>,
    pub medication: Option<&'a Medication>,
    pub risk: Option<&'a RiskAssessment>,
}

impl<'a> ConditionContext<'a> {
    pub fn for_profile(profile: &'a PatientProfile) -> Self {
        Self {
            profile,
            plan_item: None,
            medication: None,
            risk: None,
        }
    }

    pub fn with_plan_item(mut self, item: &'a PlanItem) -> Self {
        self.plan_item = Some(item);
        self
    }

    pub fn with_medication(mut self, medication: &'a Medication) -> Self {
        self.medication = Some(medication);
        self
    }

    pub fn with_risk(mut self, risk: &'a RiskAssessment) -> Self {
        self.risk = Some(risk);
        self
    }
}

impl Condition {
    pub fn evaluate(&self, ctx: &ConditionContext<'_>) -> bool {
        let p = ctx.profile;
        match self {
            Condition::Always => true,
            Condition::All { of } => of.iter().all(|c| c.evaluate(ctx)),
            Condition::Any { of } => of.iter().any(|c| c.evaluate(ctx)),
            Condition::Not { of } => !of.evaluate(ctx),
            Condition::Known { field } => p.is_known(*field),
            Condition::AgeAtLeast { years } => p.age().is_some_and(|a| a >= *years),
            Condition::AgeBelow { years } => p.age().is_some_and(|a| a < *years),
            Condition::Sex { sex } => p.sex() == Some(*sex),
            Condition::Pregnant => p.pregnant() == Some(true),
            Condition::Smoker => p.smoker() == Some(true),
            Condition::SystolicAtLeast { mmhg } => {
                p.blood_pressure().is_some_and(|bp| bp.systolic >= *mmhg)
            }
            Condition::DiastolicAtLeast { mmhg } => {
                p.blood_pressure()
                    .is_some_and(|bp| bp.diastolic.is_some_and(|d| d >= *mmhg))
            }
            Condition::BloodPressureAtLeast {
                systolic,
                diastolic,
            } => p
                .blood_pressure()
                .is_some_and(|bp| {
                    bp.systolic >= *systolic || bp.diastolic.is_some_and(|d| d >= *diastolic)
                }),
            Condition::HeartRateBelow { bpm } => p.heart_rate().is_some_and(|hr| hr < *bpm),
            Condition::BmiAtLeast { value } => p.bmi().is_some_and(|b| b >= *value),
            Condition::LabAtLeast { lab, value } => p.lab(*lab).is_some_and(|v| v >= *value),
            Condition::LabAbove { lab, value } => p.lab(*lab).is_some_and(|v| v > *value),
            Condition::LabBelow { lab, value } => p.lab(*lab).is_some_and(|v| v < *value),
            Condition::Comorbidity { codes } => codes.iter().any(|c| p.has_comorbidity(c)),
            Condition::Symptom {
                codes,
                within_hours,
            } => p.symptoms().any(|s| {
                codes.contains(&s.code)
                    && match (within_hours, s.onset_hours) {
                        (Some(limit), Some(onset)) => onset <= *limit,
                        _ => true,
                    }
            }),
            Condition::TakingDrugClass { classes } => p.medications().any(|m| {
                m.drug_class
                    .as_ref()
                    .is_some_and(|class| classes.contains(class))
            }),
            Condition::TakingDrug { codes } => p.medications().any(|m| codes.contains(&m.code)),
            Condition::PlanItemClass { classes } => ctx.plan_item.is_some_and(|item| {
                item.drug_class
                    .as_ref()
                    .is_some_and(|class| classes.contains(class))
            }),
            Condition::MedicationClass { classes } => ctx.medication.is_some_and(|m| {
                m.drug_class
                    .as_ref()
                    .is_some_and(|class| classes.contains(class))
            }),
            Condition::PlanItemCategory { categories } => ctx
                .plan_item
                .is_some_and(|item| categories.contains(&item.category)),
            Condition::BpStage { stages } => ctx.risk.is_some_and(|r| {
                r.bp_stage
                    .as_ref()
                    .is_some_and(|stage| stages.contains(stage))
            }),
            Condition::GlycemicControl { levels } => ctx.risk.is_some_and(|r| {
                r.glycemic_control
                    .is_some_and(|level| levels.contains(&level))
            }),
            Condition::CardiovascularRiskAtLeast { level } => ctx
                .risk
                .is_some_and(|r| r.cardiovascular_risk.is_some_and(|l| l >= *level)),
        }
    }

    /// Profile fields the condition reads, used to report which inputs a
    /// rule was missing.
    pub fn fields(&self) -> Vec<FieldId> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out.sort();
        out.dedup();
        out
    }

    fn collect_fields(&self, out: &mut Vec<FieldId>) {
        match self {
            Condition::All { of } | Condition::Any { of } => {
                for c in of {
                    c.collect_fields(out);
                }
            }
            Condition::Not { of } => of.collect_fields(out),
            Condition::Known { field } => out.push(*field),
            Condition::AgeAtLeast { .. } | Condition::AgeBelow { .. } => out.push(FieldId::Age),
            Condition::Sex { .. } => out.push(FieldId::Sex),
            Condition::Pregnant => out.push(FieldId::Pregnancy),
            Condition::Smoker => out.push(FieldId::Smoking),
            Condition::SystolicAtLeast { .. }
            | Condition::DiastolicAtLeast { .. }
            | Condition::BloodPressureAtLeast { .. } => out.push(FieldId::BloodPressure),
            Condition::HeartRateBelow { .. } => out.push(FieldId::HeartRate),
            Condition::BmiAtLeast { .. } => out.push(FieldId::Bmi),
            Condition::LabAtLeast { lab, .. }
            | Condition::LabAbove { lab, .. }
            | Condition::LabBelow { lab, .. } => out.push(match lab {
                LabCode::Hba1c => FieldId::Hba1c,
                LabCode::FastingGlucose => FieldId::FastingGlucose,
                LabCode::Potassium => FieldId::Potassium,
                LabCode::Egfr => FieldId::Egfr,
                LabCode::Ldl => FieldId::Ldl,
            }),
            Condition::Comorbidity { .. } => out.push(FieldId::Comorbidities),
            Condition::Symptom { .. } => out.push(FieldId::Symptoms),
            Condition::TakingDrugClass { .. } | Condition::TakingDrug { .. } => {
                out.push(FieldId::Medications)
            }
            Condition::Always
            | Condition::PlanItemClass { .. }
            | Condition::MedicationClass { .. }
            | Condition::PlanItemCategory { .. }
            | Condition::BpStage { .. }
            | Condition::GlycemicControl { .. }
            | Condition::CardiovascularRiskAtLeast { .. } => {}
        }
    }
}
