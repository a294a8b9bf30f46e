//! The declarative risk table. Thresholds and staging rules live here as
//! data so that a new table version needs no code change.

use std::collections::HashSet;
use std::path::Path;

use medguide_core::Condition;
use medguide_core::models::profile::FieldId;
use medguide_core::models::risk::{CardiovascularRisk, GlycemicControl, RiskTier};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::RiskError;

const BUNDLED_TABLE: &str = include_str!("../data/risk_table.json");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BpStage {
    pub id: String,
    pub label: String,
    pub systolic_min: u32,
    pub diastolic_min: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedStage {
    pub id: String,
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlycemicBand {
    pub good_below: f64,
    pub poor_from: f64,
}

impl GlycemicBand {
    pub fn classify(&self, value: f64) -> GlycemicControl {
        if value < self.good_below {
            GlycemicControl::Good
        } else if value < self.poor_from {
            GlycemicControl::Moderate
        } else {
            GlycemicControl::Poor
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlycemicBands {
    pub hba1c: GlycemicBand,
    pub fasting_glucose: GlycemicBand,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierRule {
    pub id: String,
    pub label: String,
    pub severity: u8,
    #[serde(default)]
    pub bp_stages: Vec<String>,
    #[serde(default)]
    pub glycemic: Vec<GlycemicControl>,
    #[serde(default)]
    pub when: Option<Condition>,
}

impl TierRule {
    pub fn tier(&self) -> RiskTier {
        RiskTier {
            id: self.id.clone(),
            label: self.label.clone(),
            severity: self.severity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorKind {
    RiskFactor,
    Diabetes,
    OrganDamage,
    ClinicalCondition,
    Modifier,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorRule {
    pub id: String,
    pub label: String,
    pub kind: FactorKind,
    pub weight: f64,
    /// Fields that must be known before the factor can be judged.
    #[serde(default)]
    pub requires: Vec<FieldId>,
    pub when: Condition,
}

impl FactorRule {
    /// Counted towards the risk-factor total of cardiovascular rules.
    pub fn counts_as_risk_factor(&self) -> bool {
        matches!(self.kind, FactorKind::RiskFactor | FactorKind::Diabetes)
    }
}

/// Every populated criterion must hold for the rule to apply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardiovascularRule {
    pub level: CardiovascularRisk,
    #[serde(default)]
    pub bp_stages: Vec<String>,
    #[serde(default)]
    pub min_risk_factors: Option<usize>,
    #[serde(default)]
    pub any_factors: Vec<String>,
    #[serde(default)]
    pub all_factors: Vec<String>,
    #[serde(default)]
    pub when: Option<Condition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowUpRule {
    pub level: CardiovascularRisk,
    pub interval_weeks: u32,
    pub monitoring: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskTable {
    pub version: String,
    /// Ordered from mildest to most severe.
    pub bp_stages: Vec<BpStage>,
    pub normal_stage: NamedStage,
    pub glycemic: GlycemicBands,
    pub tiers: Vec<TierRule>,
    pub default_tier: RiskTier,
    pub factors: Vec<FactorRule>,
    pub cardiovascular: Vec<CardiovascularRule>,
    pub follow_up: Vec<FollowUpRule>,
    #[serde(default)]
    pub lifestyle_goals: Vec<String>,
}

impl RiskTable {
    pub fn bundled() -> Result<Self, RiskError> {
        Self::from_json(BUNDLED_TABLE)
    }

    pub fn load(path: &Path) -> Result<Self, RiskError> {
        let raw = std::fs::read_to_string(path)?;
        let table = Self::from_json(&raw)?;
        info!(path = %path.display(), version = %table.version, "loaded risk table");
        Ok(table)
    }

    pub fn from_json(raw: &str) -> Result<Self, RiskError> {
        let table: RiskTable = serde_json::from_str(raw)?;
        table.validate()?;
        Ok(table)
    }

    pub fn stage_label(&self, id: &str) -> Option<&str> {
        if self.normal_stage.id == id {
            return Some(&self.normal_stage.label);
        }
        self.bp_stages
            .iter()
            .find(|s| s.id == id)
            .map(|s| s.label.as_str())
    }

    fn validate(&self) -> Result<(), RiskError> {
        let mut stage_ids: HashSet<&str> = HashSet::new();
        stage_ids.insert(&self.normal_stage.id);
        for stage in &self.bp_stages {
            if !stage_ids.insert(&stage.id) {
                return Err(RiskError::Invalid(format!("duplicate stage {}", stage.id)));
            }
        }
        for pair in self.bp_stages.windows(2) {
            if pair[1].systolic_min < pair[0].systolic_min || pair[1].diastolic_min < pair[0].diastolic_min {
                return Err(RiskError::Invalid(format!(
                    "stage {} has lower thresholds than {}",
                    pair[1].id, pair[0].id
                )));
            }
        }

        let mut tier_ids: HashSet<&str> = HashSet::new();
        for tier in &self.tiers {
            if !tier_ids.insert(&tier.id) {
                return Err(RiskError::Invalid(format!("duplicate tier {}", tier.id)));
            }
            if let Some(unknown) = tier.bp_stages.iter().find(|s| !stage_ids.contains(s.as_str())) {
                return Err(RiskError::Invalid(format!(
                    "tier {} references unknown stage {unknown}",
                    tier.id
                )));
            }
        }

        let mut factor_ids: HashSet<&str> = HashSet::new();
        for factor in &self.factors {
            if !factor_ids.insert(&factor.id) {
                return Err(RiskError::Invalid(format!("duplicate factor {}", factor.id)));
            }
        }
        for rule in &self.cardiovascular {
            if let Some(unknown) = rule
                .any_factors
                .iter()
                .chain(&rule.all_factors)
                .find(|f| !factor_ids.contains(f.as_str()))
            {
                return Err(RiskError::Invalid(format!(
                    "cardiovascular rule references unknown factor {unknown}"
                )));
            }
            if let Some(unknown) = rule.bp_stages.iter().find(|s| !stage_ids.contains(s.as_str())) {
                return Err(RiskError::Invalid(format!(
                    "cardiovascular rule references unknown stage {unknown}"
                )));
            }
        }
        Ok(())
    }
}
