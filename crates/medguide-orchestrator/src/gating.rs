//! Final safety gate over the drafted plan.
//!
//! The guard is re-run against every drafted line. Blocked lines leave the
//! plan, each removal becomes a provenance event, and where the blocking
//! rules allow it a replacement from another drug class is drafted and
//! checked in turn. `refer` directives become instruction lines placed
//! above everything else.

use medguide_core::models::evidence::EvidenceItem;
use medguide_core::models::plan::{LineProvenance, PlanCategory, PlanItem, PlanLine};
use medguide_core::models::profile::PatientProfile;
use medguide_core::models::provenance::ProvenanceEvent;
use medguide_core::models::safety::{sort_for_display, DirectiveTarget, SafetyDirective, Severity};
use medguide_safety::{detect_conflicts, gate_plan, RuleConflict, SafetyGuard, SubstitutionRequest};
use tracing::info;

use crate::catalog::TreatmentRule;
use crate::synthesis::{line_provenance, DraftLine};

#[derive(Debug, Clone, Default)]
pub struct GatedPlan {
    pub lines: Vec<PlanLine>,
    /// Every directive raised against the profile, the draft and any
    /// substitutes, in display order.
    pub directives: Vec<SafetyDirective>,
    pub conflicts: Vec<RuleConflict>,
    pub events: Vec<ProvenanceEvent>,
}

pub fn gate(
    draft: Vec<DraftLine>,
    substitutes: &[&TreatmentRule],
    profile: &PatientProfile,
    guard: &SafetyGuard,
    bundle: &[EvidenceItem],
) -> GatedPlan {
    let items: Vec<PlanItem> = draft.iter().map(|l| l.item.clone()).collect();
    let mut directives = guard.evaluate(profile, &items);
    let outcome = gate_plan(items, &directives);

    let mut events = Vec::new();
    for removed in &outcome.removed {
        for rule_id in &removed.rule_ids {
            let reason = directives
                .iter()
                .find(|d| &d.trigger_rule_id == rule_id && d.targets_line(&removed.item.line_id))
                .map(|d| d.message.clone())
                .unwrap_or_default();
            events.push(ProvenanceEvent::PlanLineRemoved {
                line_id: removed.item.line_id.clone(),
                rule_id: rule_id.clone(),
                reason,
            });
        }
    }

    let mut kept: Vec<DraftLine> = draft
        .into_iter()
        .filter(|l| outcome.kept.iter().any(|k| k.line_id == l.item.line_id))
        .collect();

    for request in &outcome.substitutions {
        let Some(line) = find_substitute(request, &kept, substitutes, profile, guard, bundle) else {
            info!(line_id = %request.removed_line_id, "no admissible substitute");
            continue;
        };
        let rule_id = request.rule_ids.first().cloned().unwrap_or_default();
        events.push(ProvenanceEvent::PlanLineSubstituted {
            removed_line_id: request.removed_line_id.clone(),
            substitute_line_id: line.item.line_id.clone(),
            rule_id,
        });
        let added: Vec<PlanItem> = vec![line.item.clone()];
        directives.extend(
            guard
                .evaluate(profile, &added)
                .into_iter()
                .filter(|d| d.targets_line(&line.item.line_id)),
        );
        kept.push(line);
    }

    sort_for_display(&mut directives);
    let conflicts = detect_conflicts(&directives);
    for conflict in &conflicts {
        events.push(ProvenanceEvent::RuleConflict {
            target: target_label(&conflict.target),
            rule_ids: conflict.rule_ids.clone(),
            effective: conflict.effective,
        });
    }

    let lines = order_lines(&outcome.instructions, kept, guard.version());
    GatedPlan {
        lines,
        directives,
        conflicts,
        events,
    }
}

/// Lowest-priority admissible candidate of the same category whose class
/// is not excluded, not already in the plan, not blocked itself and backed
/// by evidence.
fn find_substitute(
    request: &SubstitutionRequest,
    kept: &[DraftLine],
    substitutes: &[&TreatmentRule],
    profile: &PatientProfile,
    guard: &SafetyGuard,
    bundle: &[EvidenceItem],
) -> Option<DraftLine> {
    let mut candidates: Vec<&&TreatmentRule> = substitutes
        .iter()
        .filter(|rule| rule.category == request.category)
        .filter(|rule| {
            rule.drug_class
                .as_ref()
                .is_some_and(|class| !request.exclude_classes.contains(class))
        })
        .filter(|rule| {
            !kept.iter().any(|l| {
                l.item.line_id == rule.id || (l.item.drug_class.is_some() && l.item.drug_class == rule.drug_class)
            })
        })
        .collect();
    candidates.sort_by_key(|rule| rule.priority);

    candidates.into_iter().find_map(|rule| {
        let item = rule.to_item();
        let blocked = guard
            .evaluate(profile, std::slice::from_ref(&item))
            .iter()
            .any(|d| d.severity == Severity::Block && d.targets_line(&item.line_id));
        if blocked {
            return None;
        }
        let provenance = line_provenance(rule, bundle);
        if provenance.is_empty() {
            return None;
        }
        Some(DraftLine {
            item,
            rank: rule.priority,
            provenance,
            substituted_for: Some(request.removed_line_id.clone()),
        })
    })
}

/// Instructions first, in directive display order, then plan lines by
/// category and catalog priority. Priorities are renumbered from 1.
fn order_lines(instructions: &[SafetyDirective], mut kept: Vec<DraftLine>, safety_version: &str) -> Vec<PlanLine> {
    let mut ordered: Vec<DraftLine> = instructions
        .iter()
        .map(|d| DraftLine {
            item: PlanItem {
                line_id: format!("refer:{}", d.trigger_rule_id),
                category: PlanCategory::Instruction,
                drug_class: None,
                drug: None,
                text: format!("{} {}", d.message, d.required_action),
            },
            rank: 0,
            provenance: vec![LineProvenance::Rule {
                table_version: safety_version.to_string(),
                rule_id: d.trigger_rule_id.clone(),
            }],
            substituted_for: None,
        })
        .collect();

    kept.sort_by(|a, b| {
        a.item
            .category
            .cmp(&b.item.category)
            .then_with(|| a.rank.cmp(&b.rank))
            .then_with(|| a.item.line_id.cmp(&b.item.line_id))
    });
    ordered.extend(kept);

    ordered
        .into_iter()
        .enumerate()
        .map(|(i, line)| PlanLine {
            item: line.item,
            priority: i as u32 + 1,
            provenance: line.provenance,
            substituted_for: line.substituted_for,
        })
        .collect()
}

pub fn target_label(target: &DirectiveTarget) -> String {
    match target {
        DirectiveTarget::PlanLine { line_id } => format!("plan_line:{line_id}"),
        DirectiveTarget::Medication { code } => format!("medication:{code}"),
    }
}
