//! Diagnosis and treatment catalogs: the declarative candidates that
//! synthesis scores, backs with evidence and drafts into a plan.

use std::collections::HashSet;
use std::path::Path;

use medguide_core::Condition;
use medguide_core::models::plan::{PlanCategory, PlanItem};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::OrchestratorError;

const BUNDLED_DIAGNOSES: &str = include_str!("../data/diagnosis_catalog.json");
const BUNDLED_TREATMENTS: &str = include_str!("../data/treatment_catalog.json");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBoost {
    pub when: Condition,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisRule {
    pub code: String,
    pub label: String,
    pub when: Condition,
    pub base_score: f64,
    #[serde(default)]
    pub boosts: Vec<ScoreBoost>,
    /// An evidence item supports the diagnosis if it mentions any of these.
    pub evidence_terms: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisCatalog {
    pub version: String,
    pub diagnoses: Vec<DiagnosisRule>,
}

impl DiagnosisCatalog {
    pub fn bundled() -> Result<Self, OrchestratorError> {
        Self::from_json(BUNDLED_DIAGNOSES)
    }

    pub fn load(path: &Path) -> Result<Self, OrchestratorError> {
        let raw = std::fs::read_to_string(path)?;
        let catalog = Self::from_json(&raw)?;
        info!(path = %path.display(), version = %catalog.version, diagnoses = catalog.diagnoses.len(), "loaded diagnosis catalog");
        Ok(catalog)
    }

    pub fn from_json(raw: &str) -> Result<Self, OrchestratorError> {
        let catalog: Self = serde_json::from_str(raw)?;
        let mut seen = HashSet::new();
        for rule in &catalog.diagnoses {
            if !seen.insert(rule.code.as_str()) {
                return Err(OrchestratorError::RuleTable(format!("duplicate diagnosis code {}", rule.code)));
            }
            if rule.evidence_terms.is_empty() {
                return Err(OrchestratorError::RuleTable(format!(
                    "diagnosis {} names no evidence terms",
                    rule.code
                )));
            }
        }
        Ok(catalog)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreatmentRule {
    pub id: String,
    pub category: PlanCategory,
    pub text: String,
    #[serde(default)]
    pub drug_class: Option<String>,
    #[serde(default)]
    pub drug: Option<String>,
    pub when: Condition,
    pub evidence_terms: Vec<String>,
    /// Lower sorts first within a category.
    pub priority: u32,
    /// Only ever offered as the replacement for a blocked line.
    #[serde(default)]
    pub substitute_only: bool,
}

impl TreatmentRule {
    pub fn to_item(&self) -> PlanItem {
        PlanItem {
            line_id: self.id.clone(),
            category: self.category,
            drug_class: self.drug_class.clone(),
            drug: self.drug.clone(),
            text: self.text.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreatmentCatalog {
    pub version: String,
    pub treatments: Vec<TreatmentRule>,
}

impl TreatmentCatalog {
    pub fn bundled() -> Result<Self, OrchestratorError> {
        Self::from_json(BUNDLED_TREATMENTS)
    }

    pub fn load(path: &Path) -> Result<Self, OrchestratorError> {
        let raw = std::fs::read_to_string(path)?;
        let catalog = Self::from_json(&raw)?;
        info!(path = %path.display(), version = %catalog.version, treatments = catalog.treatments.len(), "loaded treatment catalog");
        Ok(catalog)
    }

    pub fn from_json(raw: &str) -> Result<Self, OrchestratorError> {
        let catalog: Self = serde_json::from_str(raw)?;
        let mut seen = HashSet::new();
        for rule in &catalog.treatments {
            if !seen.insert(rule.id.as_str()) {
                return Err(OrchestratorError::RuleTable(format!("duplicate treatment id {}", rule.id)));
            }
            if rule.category == PlanCategory::Instruction {
                return Err(OrchestratorError::RuleTable(format!(
                    "treatment {} uses the instruction category, which is reserved for safety referrals",
                    rule.id
                )));
            }
        }
        Ok(catalog)
    }

    pub fn get(&self, id: &str) -> Option<&TreatmentRule> {
        self.treatments.iter().find(|t| t.id == id)
    }
}
