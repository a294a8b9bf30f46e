//! Applying directives to a drafted plan.

use std::collections::BTreeMap;

use medguide_core::models::plan::{PlanCategory, PlanItem};
use medguide_core::models::safety::{DirectiveTarget, SafetyDirective, Severity};
use serde::Serialize;
use tracing::warn;

/// Directives of different severity aimed at the same target. The
/// effective action is the most severe one; every directive stays visible.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleConflict {
    pub target: DirectiveTarget,
    pub rule_ids: Vec<String>,
    pub effective: Severity,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemovedLine {
    pub item: PlanItem,
    pub rule_ids: Vec<String>,
}

/// A blocked line whose rules allow a replacement from another class.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubstitutionRequest {
    pub removed_line_id: String,
    pub category: PlanCategory,
    pub rule_ids: Vec<String>,
    pub exclude_classes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct GateOutcome {
    pub kept: Vec<PlanItem>,
    pub removed: Vec<RemovedLine>,
    pub substitutions: Vec<SubstitutionRequest>,
    /// `refer` directives in display order, to be placed above every plan
    /// line.
    pub instructions: Vec<SafetyDirective>,
    pub conflicts: Vec<RuleConflict>,
}

pub fn detect_conflicts(directives: &[SafetyDirective]) -> Vec<RuleConflict> {
    let mut by_target: BTreeMap<&DirectiveTarget, Vec<&SafetyDirective>> = BTreeMap::new();
    for d in directives {
        if let Some(target) = &d.target {
            by_target.entry(target).or_default().push(d);
        }
    }

    let mut conflicts = Vec::new();
    for (target, group) in by_target {
        let first = group[0].severity;
        if group.iter().all(|d| d.severity == first) {
            continue;
        }
        let effective = group.iter().map(|d| d.severity).max().unwrap_or(first);
        let mut rule_ids: Vec<String> = group.iter().map(|d| d.trigger_rule_id.clone()).collect();
        rule_ids.sort();
        rule_ids.dedup();
        warn!(?target, effective = %effective, rules = ?rule_ids, "safety rule conflict");
        conflicts.push(RuleConflict {
            target: target.clone(),
            rule_ids,
            effective,
        });
    }
    conflicts
}

/// Remove every item targeted by a `block`, collect substitution requests
/// and lift `refer` directives into instructions.
pub fn gate_plan(items: Vec<PlanItem>, directives: &[SafetyDirective]) -> GateOutcome {
    let mut outcome = GateOutcome {
        conflicts: detect_conflicts(directives),
        instructions: directives
            .iter()
            .filter(|d| d.severity == Severity::Refer)
            .cloned()
            .collect(),
        ..GateOutcome::default()
    };

    for item in items {
        let blocks: Vec<&SafetyDirective> = directives
            .iter()
            .filter(|d| d.severity == Severity::Block && d.targets_line(&item.line_id))
            .collect();
        if blocks.is_empty() {
            outcome.kept.push(item);
            continue;
        }

        let rule_ids: Vec<String> = blocks.iter().map(|d| d.trigger_rule_id.clone()).collect();
        if blocks.iter().all(|d| !d.substitute_excluding.is_empty()) {
            let mut exclude_classes: Vec<String> = blocks
                .iter()
                .flat_map(|d| d.substitute_excluding.iter().cloned())
                .collect();
            exclude_classes.sort();
            exclude_classes.dedup();
            outcome.substitutions.push(SubstitutionRequest {
                removed_line_id: item.line_id.clone(),
                category: item.category,
                rule_ids: rule_ids.clone(),
                exclude_classes,
            });
        }
        outcome.removed.push(RemovedLine { item, rule_ids });
    }
    outcome
}
