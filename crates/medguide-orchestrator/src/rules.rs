use medguide_risk::RiskTable;
use medguide_safety::SafetyRuleTable;
use medguide_terms::Lexicon;
use serde::Serialize;
use tracing::info;

use crate::catalog::{DiagnosisCatalog, TreatmentCatalog};
use crate::config::RuleTablePaths;
use crate::error::OrchestratorError;

/// Every declarative table the engine runs on, loaded once at start.
#[derive(Debug, Clone)]
pub struct RuleSet {
    pub lexicon: Lexicon,
    pub risk: RiskTable,
    pub safety: SafetyRuleTable,
    pub diagnoses: DiagnosisCatalog,
    pub treatments: TreatmentCatalog,
}

/// Versions of the loaded tables, reported with every response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableVersions {
    pub lexicon: String,
    pub risk: String,
    pub safety: String,
    pub diagnoses: String,
    pub treatments: String,
}

impl RuleSet {
    pub fn bundled() -> Result<Self, OrchestratorError> {
        Self::load(&RuleTablePaths::default())
    }

    /// Bundled tables, each replaced by its file when a path is given.
    pub fn load(paths: &RuleTablePaths) -> Result<Self, OrchestratorError> {
        let lexicon = match &paths.lexicon {
            Some(path) => Lexicon::load(path)?,
            None => Lexicon::bundled()?,
        };
        let risk = match &paths.risk_table {
            Some(path) => RiskTable::load(path)?,
            None => RiskTable::bundled()?,
        };
        let safety = match &paths.safety_rules {
            Some(path) => SafetyRuleTable::load(path)?,
            None => SafetyRuleTable::bundled()?,
        };
        let diagnoses = match &paths.diagnosis_catalog {
            Some(path) => DiagnosisCatalog::load(path)?,
            None => DiagnosisCatalog::bundled()?,
        };
        let treatments = match &paths.treatment_catalog {
            Some(path) => TreatmentCatalog::load(path)?,
            None => TreatmentCatalog::bundled()?,
        };

        let rules = Self {
            lexicon,
            risk,
            safety,
            diagnoses,
            treatments,
        };
        let versions = rules.versions();
        info!(
            lexicon = %versions.lexicon,
            risk = %versions.risk,
            safety = %versions.safety,
            diagnoses = %versions.diagnoses,
            treatments = %versions.treatments,
            "rule tables loaded"
        );
        Ok(rules)
    }

    pub fn versions(&self) -> TableVersions {
        TableVersions {
            lexicon: self.lexicon.version().to_string(),
            risk: self.risk.version.clone(),
            safety: self.safety.version.clone(),
            diagnoses: self.diagnoses.version.clone(),
            treatments: self.treatments.version.clone(),
        }
    }
}
