//! The patient profile: typed clinical facts built up turn by turn.
//!
//! Every fact carries the turn that supplied it. Changing a value appends a
//! [`FactUpdate`] to the profile's history, so earlier values remain visible
//! after they are replaced.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::evidence::Locator;
use crate::error::CoreError;

/// Session-local turn sequence number. Turn 0 is the chart loaded when the
/// session opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TurnId(pub u32);

impl TurnId {
    pub const CHART: TurnId = TurnId(0);
}

impl fmt::Display for TurnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "turn-{}", self.0)
    }
}

/// A value plus the turn it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact<T> {
    pub value: T,
    pub source_turn: TurnId,
    pub recorded_at: jiff::Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sex {
    Male,
    Female,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BloodPressure {
    pub systolic: u32,
    /// Absent when only a systolic reading was reported.
    pub diastolic: Option<u32>,
}

impl fmt::Display for BloodPressure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.diastolic {
            Some(diastolic) => write!(f, "{}/{} mmHg", self.systolic, diastolic),
            None => write!(f, "systolic {} mmHg", self.systolic),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabCode {
    /// Glycated haemoglobin, percent.
    Hba1c,
    /// mmol/L.
    FastingGlucose,
    /// mmol/L.
    Potassium,
    /// mL/min/1.73m².
    Egfr,
    /// mmol/L.
    Ldl,
}

impl LabCode {
    pub fn unit(self) -> &'static str {
        match self {
            LabCode::Hba1c => "%",
            LabCode::FastingGlucose | LabCode::Potassium | LabCode::Ldl => "mmol/L",
            LabCode::Egfr => "mL/min/1.73m2",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Medication {
    /// Canonical drug code (e.g. `drug:enalapril`) or class code when only the
    /// class is known (e.g. `class:acei`).
    pub code: String,
    pub label: String,
    pub drug_class: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symptom {
    pub code: String,
    pub label: String,
    /// Hours since onset, when reported.
    pub onset_hours: Option<f64>,
}

/// Identifies a profile attribute for missing-field tracking, rule
/// requirements and the update history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldId {
    Age,
    Sex,
    BloodPressure,
    HeartRate,
    Bmi,
    Hba1c,
    FastingGlucose,
    Potassium,
    Egfr,
    Ldl,
    Pregnancy,
    Smoking,
    Medications,
    Comorbidities,
    Symptoms,
}

impl FieldId {
    pub fn as_str(self) -> &'static str {
        match self {
            FieldId::Age => "age",
            FieldId::Sex => "sex",
            FieldId::BloodPressure => "blood_pressure",
            FieldId::HeartRate => "heart_rate",
            FieldId::Bmi => "bmi",
            FieldId::Hba1c => "hba1c",
            FieldId::FastingGlucose => "fasting_glucose",
            FieldId::Potassium => "potassium",
            FieldId::Egfr => "egfr",
            FieldId::Ldl => "ldl",
            FieldId::Pregnancy => "pregnancy",
            FieldId::Smoking => "smoking",
            FieldId::Medications => "medications",
            FieldId::Comorbidities => "comorbidities",
            FieldId::Symptoms => "symptoms",
        }
    }

    fn for_lab(lab: LabCode) -> Self {
        match lab {
            LabCode::Hba1c => FieldId::Hba1c,
            LabCode::FastingGlucose => FieldId::FastingGlucose,
            LabCode::Potassium => FieldId::Potassium,
            LabCode::Egfr => FieldId::Egfr,
            LabCode::Ldl => FieldId::Ldl,
        }
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let field = match s {
            "age" => FieldId::Age,
            "sex" => FieldId::Sex,
            "blood_pressure" => FieldId::BloodPressure,
            "heart_rate" => FieldId::HeartRate,
            "bmi" => FieldId::Bmi,
            "hba1c" => FieldId::Hba1c,
            "fasting_glucose" => FieldId::FastingGlucose,
            "potassium" => FieldId::Potassium,
            "egfr" => FieldId::Egfr,
            "ldl" => FieldId::Ldl,
            "pregnancy" => FieldId::Pregnancy,
            "smoking" => FieldId::Smoking,
            "medications" => FieldId::Medications,
            "comorbidities" => FieldId::Comorbidities,
            "symptoms" => FieldId::Symptoms,
            other => return Err(CoreError::UnknownField(other.to_string())),
        };
        Ok(field)
    }
}

/// One entry in the profile's append-only change log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactUpdate {
    pub field: FieldId,
    pub previous: Option<serde_json::Value>,
    pub value: serde_json::Value,
    pub source_turn: TurnId,
    pub recorded_at: jiff::Timestamp,
    /// Record the value was read from, for facts seeded from a chart.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Locator>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PatientProfile {
    patient_id: String,
    age: Option<Fact<u32>>,
    sex: Option<Fact<Sex>>,
    blood_pressure: Option<Fact<BloodPressure>>,
    heart_rate: Option<Fact<u32>>,
    bmi: Option<Fact<f64>>,
    pregnant: Option<Fact<bool>>,
    smoker: Option<Fact<bool>>,
    labs: BTreeMap<LabCode, Fact<f64>>,
    medications: Vec<Fact<Medication>>,
    comorbidities: Vec<Fact<String>>,
    symptoms: Vec<Fact<Symptom>>,
    history: Vec<FactUpdate>,
}

impl PatientProfile {
    pub fn new(patient_id: impl Into<String>) -> Self {
        Self {
            patient_id: patient_id.into(),
            ..Self::default()
        }
    }

    pub fn patient_id(&self) -> &str {
        &self.patient_id
    }

    pub fn age(&self) -> Option<u32> {
        self.age.as_ref().map(|f| f.value)
    }

    pub fn sex(&self) -> Option<Sex> {
        self.sex.as_ref().map(|f| f.value)
    }

    pub fn blood_pressure(&self) -> Option<BloodPressure> {
        self.blood_pressure.as_ref().map(|f| f.value)
    }

    pub fn heart_rate(&self) -> Option<u32> {
        self.heart_rate.as_ref().map(|f| f.value)
    }

    pub fn bmi(&self) -> Option<f64> {
        self.bmi.as_ref().map(|f| f.value)
    }

    /// `None` when pregnancy status has not been established.
    pub fn pregnant(&self) -> Option<bool> {
        self.pregnant.as_ref().map(|f| f.value)
    }

    pub fn smoker(&self) -> Option<bool> {
        self.smoker.as_ref().map(|f| f.value)
    }

    pub fn lab(&self, lab: LabCode) -> Option<f64> {
        self.labs.get(&lab).map(|f| f.value)
    }

    pub fn medications(&self) -> impl Iterator<Item = &Medication> {
        self.medications.iter().map(|f| &f.value)
    }

    pub fn comorbidities(&self) -> impl Iterator<Item = &str> {
        self.comorbidities.iter().map(|f| f.value.as_str())
    }

    pub fn has_comorbidity(&self, code: &str) -> bool {
        self.comorbidities.iter().any(|f| f.value == code)
    }

    pub fn symptoms(&self) -> impl Iterator<Item = &Symptom> {
        self.symptoms.iter().map(|f| &f.value)
    }

    pub fn history(&self) -> &[FactUpdate] {
        &self.history
    }

    /// Source turn of the current value of a scalar field.
    pub fn source_turn(&self, field: FieldId) -> Option<TurnId> {
        match field {
            FieldId::Age => self.age.as_ref().map(|f| f.source_turn),
            FieldId::Sex => self.sex.as_ref().map(|f| f.source_turn),
            FieldId::BloodPressure => self.blood_pressure.as_ref().map(|f| f.source_turn),
            FieldId::HeartRate => self.heart_rate.as_ref().map(|f| f.source_turn),
            FieldId::Bmi => self.bmi.as_ref().map(|f| f.source_turn),
            FieldId::Pregnancy => self.pregnant.as_ref().map(|f| f.source_turn),
            FieldId::Smoking => self.smoker.as_ref().map(|f| f.source_turn),
            FieldId::Hba1c => self.labs.get(&LabCode::Hba1c).map(|f| f.source_turn),
            FieldId::FastingGlucose => self.labs.get(&LabCode::FastingGlucose).map(|f| f.source_turn),
            FieldId::Potassium => self.labs.get(&LabCode::Potassium).map(|f| f.source_turn),
            FieldId::Egfr => self.labs.get(&LabCode::Egfr).map(|f| f.source_turn),
            FieldId::Ldl => self.labs.get(&LabCode::Ldl).map(|f| f.source_turn),
            FieldId::Medications => self.medications.last().map(|f| f.source_turn),
            FieldId::Comorbidities => self.comorbidities.last().map(|f| f.source_turn),
            FieldId::Symptoms => self.symptoms.last().map(|f| f.source_turn),
        }
    }

    /// Whether a value for `field` has been established. List fields count as
    /// known once they hold at least one entry.
    pub fn is_known(&self, field: FieldId) -> bool {
        match field {
            FieldId::Medications => !self.medications.is_empty(),
            FieldId::Comorbidities => !self.comorbidities.is_empty(),
            FieldId::Symptoms => !self.symptoms.is_empty(),
            other => self.source_turn(other).is_some(),
        }
    }

    /// Number of scalar and list fields that currently hold a value.
    pub fn known_field_count(&self) -> usize {
        ALL_FIELDS.iter().filter(|f| self.is_known(**f)).count()
    }

    /// Open a writer that stamps every change with `turn`.
    pub fn writer(&mut self, turn: TurnId, at: jiff::Timestamp) -> ProfileWriter<'_> {
        ProfileWriter {
            profile: self,
            turn,
            at,
            source: None,
            changed: Vec::new(),
        }
    }
}

const ALL_FIELDS: [FieldId; 15] = [
    FieldId::Age,
    FieldId::Sex,
    FieldId::BloodPressure,
    FieldId::HeartRate,
    FieldId::Bmi,
    FieldId::Hba1c,
    FieldId::FastingGlucose,
    FieldId::Potassium,
    FieldId::Egfr,
    FieldId::Ldl,
    FieldId::Pregnancy,
    FieldId::Smoking,
    FieldId::Medications,
    FieldId::Comorbidities,
    FieldId::Symptoms,
];

/// Applies changes to a profile on behalf of one turn.
pub struct ProfileWriter<'a> {
    profile: &'a mut PatientProfile,
    turn: TurnId,
    at: jiff::Timestamp,
    source: Option<Locator>,
    changed: Vec<FieldId>,
}

impl ProfileWriter<'_> {
    /// Stamps the following changes with the record they were read from.
    pub fn from_record(&mut self, locator: Locator) -> &mut Self {
        self.source = Some(locator);
        self
    }

    pub fn age(&mut self, years: u32) -> &mut Self {
        let (turn, at) = (self.turn, self.at);
        if record_scalar(
            &mut self.profile.age,
            &mut self.profile.history,
            FieldId::Age,
            years,
            turn,
            at,
            self.source.as_ref(),
        ) {
            self.changed.push(FieldId::Age);
        }
        self
    }

    pub fn sex(&mut self, sex: Sex) -> &mut Self {
        let (turn, at) = (self.turn, self.at);
        if record_scalar(
            &mut self.profile.sex,
            &mut self.profile.history,
            FieldId::Sex,
            sex,
            turn,
            at,
            self.source.as_ref(),
        ) {
            self.changed.push(FieldId::Sex);
        }
        self
    }

    pub fn blood_pressure(&mut self, systolic: u32, diastolic: u32) -> &mut Self {
        self.record_blood_pressure(BloodPressure {
            systolic,
            diastolic: Some(diastolic),
        })
    }

    /// Records a systolic-only reading. A diastolic value already known from
    /// an earlier reading is not carried over.
    pub fn systolic(&mut self, systolic: u32) -> &mut Self {
        self.record_blood_pressure(BloodPressure {
            systolic,
            diastolic: None,
        })
    }

    fn record_blood_pressure(&mut self, bp: BloodPressure) -> &mut Self {
        let (turn, at) = (self.turn, self.at);
        if record_scalar(
            &mut self.profile.blood_pressure,
            &mut self.profile.history,
            FieldId::BloodPressure,
            bp,
            turn,
            at,
            self.source.as_ref(),
        ) {
            self.changed.push(FieldId::BloodPressure);
        }
        self
    }

    pub fn heart_rate(&mut self, bpm: u32) -> &mut Self {
        let (turn, at) = (self.turn, self.at);
        if record_scalar(
            &mut self.profile.heart_rate,
            &mut self.profile.history,
            FieldId::HeartRate,
            bpm,
            turn,
            at,
            self.source.as_ref(),
        ) {
            self.changed.push(FieldId::HeartRate);
        }
        self
    }

    pub fn bmi(&mut self, bmi: f64) -> &mut Self {
        let (turn, at) = (self.turn, self.at);
        if record_scalar(
            &mut self.profile.bmi,
            &mut self.profile.history,
            FieldId::Bmi,
            bmi,
            turn,
            at,
            self.source.as_ref(),
        ) {
            self.changed.push(FieldId::Bmi);
        }
        self
    }

    pub fn pregnant(&mut self, pregnant: bool) -> &mut Self {
        let (turn, at) = (self.turn, self.at);
        if record_scalar(
            &mut self.profile.pregnant,
            &mut self.profile.history,
            FieldId::Pregnancy,
            pregnant,
            turn,
            at,
            self.source.as_ref(),
        ) {
            self.changed.push(FieldId::Pregnancy);
        }
        self
    }

    pub fn smoker(&mut self, smoker: bool) -> &mut Self {
        let (turn, at) = (self.turn, self.at);
        if record_scalar(
            &mut self.profile.smoker,
            &mut self.profile.history,
            FieldId::Smoking,
            smoker,
            turn,
            at,
            self.source.as_ref(),
        ) {
            self.changed.push(FieldId::Smoking);
        }
        self
    }

    pub fn lab(&mut self, lab: LabCode, value: f64) -> &mut Self {
        let field = FieldId::for_lab(lab);
        let mut slot = self.profile.labs.remove(&lab);
        let changed = record_scalar(
            &mut slot,
            &mut self.profile.history,
            field,
            value,
            self.turn,
            self.at,
            self.source.as_ref(),
        );
        if let Some(fact) = slot {
            self.profile.labs.insert(lab, fact);
        }
        if changed {
            self.changed.push(field);
        }
        self
    }

    /// Adds a medication; an entry with the same code is left untouched.
    pub fn medication(&mut self, medication: Medication) -> &mut Self {
        if self.profile.medications.iter().any(|f| f.value.code == medication.code) {
            return self;
        }
        let value = serde_json::to_value(&medication).unwrap_or(serde_json::Value::Null);
        self.push_history(FieldId::Medications, None, value);
        self.profile.medications.push(Fact {
            value: medication,
            source_turn: self.turn,
            recorded_at: self.at,
        });
        self.changed.push(FieldId::Medications);
        self
    }

    pub fn comorbidity(&mut self, code: impl Into<String>) -> &mut Self {
        let code = code.into();
        if self.profile.has_comorbidity(&code) {
            return self;
        }
        self.push_history(FieldId::Comorbidities, None, serde_json::Value::String(code.clone()));
        self.profile.comorbidities.push(Fact {
            value: code,
            source_turn: self.turn,
            recorded_at: self.at,
        });
        self.changed.push(FieldId::Comorbidities);
        self
    }

    /// Adds a symptom, or refreshes the onset of an already recorded one.
    pub fn symptom(&mut self, symptom: Symptom) -> &mut Self {
        let new_value = serde_json::to_value(&symptom).unwrap_or(serde_json::Value::Null);
        if let Some(existing) = self
            .profile
            .symptoms
            .iter_mut()
            .find(|f| f.value.code == symptom.code)
        {
            if existing.value == symptom || symptom.onset_hours.is_none() {
                return self;
            }
            let previous = serde_json::to_value(&existing.value).ok();
            existing.value = symptom;
            existing.source_turn = self.turn;
            existing.recorded_at = self.at;
            self.push_history(FieldId::Symptoms, previous, new_value);
        } else {
            self.push_history(FieldId::Symptoms, None, new_value);
            self.profile.symptoms.push(Fact {
                value: symptom,
                source_turn: self.turn,
                recorded_at: self.at,
            });
        }
        self.changed.push(FieldId::Symptoms);
        self
    }

    /// Fields changed through this writer, in order of first change.
    pub fn changed(&self) -> Vec<FieldId> {
        let mut out: Vec<FieldId> = Vec::new();
        for field in &self.changed {
            if !out.contains(field) {
                out.push(*field);
            }
        }
        out
    }

    fn push_history(&mut self, field: FieldId, previous: Option<serde_json::Value>, value: serde_json::Value) {
        self.profile.history.push(FactUpdate {
            field,
            previous,
            value,
            source_turn: self.turn,
            recorded_at: self.at,
            source: self.source.clone(),
        });
    }
}

fn record_scalar<T>(
    slot: &mut Option<Fact<T>>,
    history: &mut Vec<FactUpdate>,
    field: FieldId,
    value: T,
    turn: TurnId,
    at: jiff::Timestamp,
    source: Option<&Locator>,
) -> bool
where
    T: Serialize + PartialEq,
{
    if slot.as_ref().is_some_and(|f| f.value == value) {
        return false;
    }
    let previous = slot
        .as_ref()
        .and_then(|f| serde_json::to_value(&f.value).ok());
    history.push(FactUpdate {
        field,
        previous,
        value: serde_json::to_value(&value).unwrap_or(serde_json::Value::Null),
        source_turn: turn,
        recorded_at: at,
        source: source.cloned(),
    });
    *slot = Some(Fact {
        value,
        source_turn: turn,
        recorded_at: at,
    });
    true
}
