//! A patient's chart as held by the clinical record store.
//!
//! Each row keeps the key it was stored under so that facts seeded from the
//! chart can point back at their exact record.

use medguide_core::models::evidence::Locator;
use medguide_core::models::profile::{LabCode, Sex};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientChart {
    pub patient_id: String,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub sex: Option<Sex>,
    #[serde(default)]
    pub height_cm: Option<f64>,
    #[serde(default)]
    pub weight_kg: Option<f64>,
    #[serde(default)]
    pub bmi: Option<f64>,
    #[serde(default)]
    pub smoker: Option<bool>,
    #[serde(default)]
    pub diagnoses: Vec<ChartDiagnosis>,
    #[serde(default)]
    pub medications: Vec<ChartMedication>,
    #[serde(default)]
    pub labs: Vec<ChartLab>,
    /// Latest hypertension assessment.
    #[serde(default)]
    pub vitals: Option<ChartVitals>,
    #[serde(default)]
    pub updated_at: Option<jiff::Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartDiagnosis {
    pub diag_id: String,
    /// Canonical condition code, e.g. `cond:t2dm`.
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartMedication {
    pub med_id: String,
    pub code: String,
    pub label: String,
    #[serde(default)]
    pub drug_class: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartLab {
    pub result_id: String,
    pub lab: LabCode,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartVitals {
    pub assessment_id: String,
    pub systolic: u32,
    pub diastolic: u32,
    #[serde(default)]
    pub heart_rate: Option<u32>,
}

fn row(table: &str, key_column: &str, key: &str) -> Locator {
    Locator::Relational {
        table: table.to_string(),
        key_column: key_column.to_string(),
        key: key.to_string(),
    }
}

impl PatientChart {
    pub fn locator(&self) -> Locator {
        row("patient_info", "patient_id", &self.patient_id)
    }

    /// BMI as charted, or derived from height and weight to one decimal.
    pub fn effective_bmi(&self) -> Option<f64> {
        self.bmi.or_else(|| match (self.height_cm, self.weight_kg) {
            (Some(h), Some(w)) if h > 0.0 => {
                let metres = h / 100.0;
                Some((w / (metres * metres) * 10.0).round() / 10.0)
            }
            _ => None,
        })
    }
}

impl ChartDiagnosis {
    pub fn locator(&self) -> Locator {
        row("diagnosis_records", "diag_id", &self.diag_id)
    }
}

impl ChartMedication {
    pub fn locator(&self) -> Locator {
        row("medication_records", "med_id", &self.med_id)
    }
}

impl ChartLab {
    pub fn locator(&self) -> Locator {
        row("lab_results", "result_id", &self.result_id)
    }
}

impl ChartVitals {
    pub fn locator(&self) -> Locator {
        row("hypertension_risk_assessment", "assessment_id", &self.assessment_id)
    }
}
