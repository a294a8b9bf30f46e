use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskTier {
    pub id: String,
    pub label: String,
    /// Higher is more severe.
    pub severity: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributingFactor {
    pub factor: String,
    pub label: String,
    pub weight: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardiovascularRisk {
    Low,
    Moderate,
    High,
    VeryHigh,
}

impl CardiovascularRisk {
    pub fn as_str(self) -> &'static str {
        match self {
            CardiovascularRisk::Low => "low",
            CardiovascularRisk::Moderate => "moderate",
            CardiovascularRisk::High => "high",
            CardiovascularRisk::VeryHigh => "very_high",
        }
    }
}

impl fmt::Display for CardiovascularRisk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowUpPlan {
    pub interval_weeks: u32,
    pub monitoring: Vec<String>,
    pub lifestyle_goals: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GlycemicControl {
    Good,
    Moderate,
    Poor,
}

/// Result of one risk evaluation. Never stored as the source of truth; the
/// orchestrator recomputes it from the profile whenever it needs one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub tier: RiskTier,
    pub contributing_factors: Vec<ContributingFactor>,
    /// Factor ids that could not be evaluated for lack of input.
    pub insufficient_data: Vec<String>,
    pub bp_stage: Option<String>,
    pub glycemic_control: Option<GlycemicControl>,
    pub cardiovascular_risk: Option<CardiovascularRisk>,
    pub follow_up: Option<FollowUpPlan>,
    pub table_version: String,
    pub trace: Vec<String>,
}

impl RiskAssessment {
    pub fn has_factor(&self, factor: &str) -> bool {
        self.contributing_factors.iter().any(|f| f.factor == factor)
    }

    pub fn total_weight(&self) -> f64 {
        self.contributing_factors.iter().map(|f| f.weight).sum()
    }
}
