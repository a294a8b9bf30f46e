//! What a turn takes in and what it hands back.

use medguide_core::models::differential::DifferentialEntry;
use medguide_core::models::evidence::EvidenceItem;
use medguide_core::models::interview::{InterviewPhase, SoapNote};
use medguide_core::models::plan::PlanLine;
use medguide_core::models::profile::{PatientProfile, Sex, TurnId};
use medguide_core::models::provenance::ProvenanceEvent;
use medguide_core::models::risk::RiskAssessment;
use medguide_core::models::safety::SafetyDirective;
use serde::{Deserialize, Serialize};

use crate::rules::TableVersions;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymptomInput {
    pub code: String,
    #[serde(default)]
    pub onset_hours: Option<f64>,
}

/// Values a caller already has in structured form. They take precedence
/// over anything extracted from the utterance of the same turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructuredFields {
    pub age: Option<u32>,
    pub sex: Option<Sex>,
    pub systolic: Option<u32>,
    pub diastolic: Option<u32>,
    pub heart_rate: Option<u32>,
    pub bmi: Option<f64>,
    pub hba1c: Option<f64>,
    pub fasting_glucose: Option<f64>,
    pub potassium: Option<f64>,
    pub egfr: Option<f64>,
    pub ldl: Option<f64>,
    pub pregnant: Option<bool>,
    pub smoker: Option<bool>,
    /// Drug or drug-class codes, e.g. `drug:enalapril`.
    pub medications: Vec<String>,
    pub comorbidities: Vec<String>,
    pub symptoms: Vec<SymptomInput>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRequest {
    pub session_id: String,
    #[serde(default)]
    pub utterance: String,
    #[serde(default)]
    pub fields: StructuredFields,
}

impl TurnRequest {
    pub fn new(session_id: impl Into<String>, utterance: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            utterance: utterance.into(),
            fields: StructuredFields::default(),
        }
    }

    pub fn with_fields(mut self, fields: StructuredFields) -> Self {
        self.fields = fields;
        self
    }
}

/// A targeted clarification question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// `field:<id>` or `ambiguity:<matched text>`.
    pub key: String,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    DataInsufficient,
    EvidenceUnavailable,
    GenerationTimeout,
    GenerationFailed,
    InvariantViolation,
    ClarificationLimit,
    RuleConflict,
    ChartUnavailable,
}

/// Something that degraded, reported next to what still succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn new(kind: NoticeKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NarrativeSource {
    Generated,
    Template,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnResponse {
    pub session_id: String,
    pub turn: TurnId,
    pub state: InterviewPhase,
    pub question: Option<Question>,
    pub differential: Vec<DifferentialEntry>,
    pub plan: Vec<PlanLine>,
    pub risk_assessment: Option<RiskAssessment>,
    pub safety_directives: Vec<SafetyDirective>,
    /// Every evidence item cited by the differential or the plan.
    pub provenance: Vec<EvidenceItem>,
    pub events: Vec<ProvenanceEvent>,
    pub notices: Vec<Notice>,
    pub disclosure_text: String,
    pub narrative: String,
    pub narrative_source: NarrativeSource,
    pub safety_report: String,
    pub soap: SoapNote,
    pub table_versions: TableVersions,
}

impl TurnResponse {
    pub fn has_notice(&self, kind: NoticeKind) -> bool {
        self.notices.iter().any(|n| n.kind == kind)
    }
}

/// Chart-only risk and medication safety for one patient.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientReview {
    pub patient_id: String,
    pub profile: PatientProfile,
    pub risk_assessment: RiskAssessment,
    pub safety_directives: Vec<SafetyDirective>,
    pub safety_report: String,
    pub table_versions: TableVersions,
}
