use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TermCategory {
    Condition,
    Symptom,
    Drug,
    DrugClass,
    Lab,
    Finding,
}

impl fmt::Display for TermCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TermCategory::Condition => "condition",
            TermCategory::Symptom => "symptom",
            TermCategory::Drug => "drug",
            TermCategory::DrugClass => "drug_class",
            TermCategory::Lab => "lab",
            TermCategory::Finding => "finding",
        };
        f.write_str(s)
    }
}

/// Byte range into the raw utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalTerm {
    pub code: String,
    pub label: String,
    pub category: TermCategory,
    pub drug_class: Option<String>,
    pub confidence: f32,
    pub matched_text: String,
    pub span: Span,
    pub negated: bool,
}

/// Candidates competing for the same span, best first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmbiguityGroup {
    pub matched_text: String,
    pub span: Span,
    pub candidates: Vec<CanonicalTerm>,
}
