//! Safety directives and their display ordering.
//!
//! Directives are ordered by severity (`refer` before `block` before `warn`),
//! then by escalation pathway (`emergency`, `obstetric`, `specialist`,
//! `routine`), then by rule priority ascending, then by rule id and target.
//! The ordering is total, so the display order never depends on the order
//! in which rules happened to fire.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warn,
    Block,
    Refer,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Warn => "warn",
            Severity::Block => "block",
            Severity::Refer => "refer",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pathway {
    #[default]
    Routine,
    Specialist,
    Obstetric,
    Emergency,
}

impl Pathway {
    pub fn as_str(self) -> &'static str {
        match self {
            Pathway::Routine => "routine",
            Pathway::Specialist => "specialist",
            Pathway::Obstetric => "obstetric",
            Pathway::Emergency => "emergency",
        }
    }
}

impl fmt::Display for Pathway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DirectiveTarget {
    /// A line of the proposed plan.
    PlanLine { line_id: String },
    /// A medication the patient already takes.
    Medication { code: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyDirective {
    pub severity: Severity,
    pub trigger_rule_id: String,
    pub message: String,
    pub required_action: String,
    pub pathway: Pathway,
    pub priority: u32,
    pub target: Option<DirectiveTarget>,
    /// Drug classes a substitute must avoid, for blocks that allow one.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub substitute_excluding: Vec<String>,
}

impl SafetyDirective {
    pub fn is_emergency(&self) -> bool {
        self.severity == Severity::Refer && self.pathway == Pathway::Emergency
    }

    pub fn targets_line(&self, line_id: &str) -> bool {
        matches!(&self.target, Some(DirectiveTarget::PlanLine { line_id: id }) if id == line_id)
    }

    pub fn display_cmp(&self, other: &Self) -> Ordering {
        other
            .severity
            .cmp(&self.severity)
            .then_with(|| other.pathway.cmp(&self.pathway))
            .then_with(|| self.priority.cmp(&other.priority))
            .then_with(|| self.trigger_rule_id.cmp(&other.trigger_rule_id))
            .then_with(|| self.target.cmp(&other.target))
    }
}

/// Sorts directives into display order.
pub fn sort_for_display(directives: &mut [SafetyDirective]) {
    directives.sort_by(SafetyDirective::display_cmp);
}
