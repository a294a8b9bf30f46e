use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::evidence::EvidenceId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DifferentialEntry {
    pub diagnosis_code: String,
    pub label: String,
    pub supporting_evidence: BTreeSet<EvidenceId>,
    /// 1-based.
    pub rank: u32,
    pub score: f64,
}
