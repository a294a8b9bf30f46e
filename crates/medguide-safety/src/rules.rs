use std::collections::HashSet;
use std::path::Path;

use medguide_core::Condition;
use medguide_core::models::safety::{Pathway, Severity};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::SafetyError;

const BUNDLED_RULES: &str = include_str!("../data/safety_rules.json");

/// What a rule is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleScope {
    /// Once per evaluation, against the profile alone.
    Profile,
    /// Once per proposed plan item; directives target that line.
    PlanItem,
    /// Once per current medication; directives target that medication.
    Medication,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Substitute {
    pub exclude_classes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyRule {
    pub id: String,
    pub scope: RuleScope,
    pub severity: Severity,
    #[serde(default)]
    pub pathway: Pathway,
    /// Lower sorts first among directives of equal severity and pathway.
    pub priority: u32,
    pub when: Condition,
    pub message: String,
    pub required_action: String,
    #[serde(default)]
    pub substitute: Option<Substitute>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyRuleTable {
    pub version: String,
    pub rules: Vec<SafetyRule>,
}

impl SafetyRuleTable {
    pub fn bundled() -> Result<Self, SafetyError> {
        Self::from_json(BUNDLED_RULES)
    }

    pub fn load(path: &Path) -> Result<Self, SafetyError> {
        let raw = std::fs::read_to_string(path)?;
        let table = Self::from_json(&raw)?;
        info!(path = %path.display(), version = %table.version, rules = table.rules.len(), "loaded safety rules");
        Ok(table)
    }

    pub fn from_json(raw: &str) -> Result<Self, SafetyError> {
        let table: SafetyRuleTable = serde_json::from_str(raw)?;
        table.validate()?;
        Ok(table)
    }

    pub fn rule(&self, id: &str) -> Option<&SafetyRule> {
        self.rules.iter().find(|r| r.id == id)
    }

    fn validate(&self) -> Result<(), SafetyError> {
        let mut seen = HashSet::new();
        for rule in &self.rules {
            if !seen.insert(rule.id.as_str()) {
                return Err(SafetyError::InvalidRule {
                    rule_id: rule.id.clone(),
                    reason: "duplicate id".to_string(),
                });
            }
            if rule.substitute.is_some()
                && (rule.severity != Severity::Block || rule.scope != RuleScope::PlanItem)
            {
                return Err(SafetyError::InvalidRule {
                    rule_id: rule.id.clone(),
                    reason: "substitutes are only allowed on plan-item block rules".to_string(),
                });
            }
        }
        Ok(())
    }
}
