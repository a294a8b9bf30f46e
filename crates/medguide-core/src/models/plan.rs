use serde::{Deserialize, Serialize};

use super::evidence::{EvidenceId, Grade, Locator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanCategory {
    /// Safety instruction prepended by gating.
    Instruction,
    Antihypertensive,
    GlycemicControl,
    Lipid,
    Lifestyle,
    Monitoring,
    Referral,
}

/// A candidate treatment line before gating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanItem {
    pub line_id: String,
    pub category: PlanCategory,
    pub drug_class: Option<String>,
    pub drug: Option<String>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LineProvenance {
    Evidence {
        evidence_id: EvidenceId,
        locator: Locator,
        grade: Grade,
    },
    Rule {
        table_version: String,
        rule_id: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanLine {
    pub item: PlanItem,
    /// Position in the delivered plan, 1-based.
    pub priority: u32,
    pub provenance: Vec<LineProvenance>,
    /// Line id this line replaced after a block.
    pub substituted_for: Option<String>,
}

impl PlanLine {
    pub fn line_id(&self) -> &str {
        &self.item.line_id
    }

    pub fn evidence_ids(&self) -> impl Iterator<Item = EvidenceId> + '_ {
        self.provenance.iter().filter_map(|p| match p {
            LineProvenance::Evidence { evidence_id, .. } => Some(*evidence_id),
            LineProvenance::Rule { .. } => None,
        })
    }

    /// Strongest grade among evidence provenance entries.
    pub fn best_grade(&self) -> Option<Grade> {
        self.provenance
            .iter()
            .filter_map(|p| match p {
                LineProvenance::Evidence { grade, .. } => Some(*grade),
                LineProvenance::Rule { .. } => None,
            })
            .max()
    }
}
