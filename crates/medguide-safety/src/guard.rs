use medguide_core::ConditionContext;
use medguide_core::models::plan::PlanItem;
use medguide_core::models::profile::PatientProfile;
use medguide_core::models::safety::{sort_for_display, DirectiveTarget, SafetyDirective};
use tracing::{debug, info};

use crate::rules::{RuleScope, SafetyRule, SafetyRuleTable};

#[derive(Debug, Clone)]
pub struct SafetyGuard {
    table: SafetyRuleTable,
}

impl SafetyGuard {
    pub fn new(table: SafetyRuleTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &SafetyRuleTable {
        &self.table
    }

    pub fn version(&self) -> &str {
        &self.table.version
    }

    /// Pre-emptive pass over the profile and current medications.
    pub fn evaluate_profile(&self, profile: &PatientProfile) -> Vec<SafetyDirective> {
        self.evaluate(profile, &[])
    }

    /// Evaluate every rule against the profile and each proposed item.
    /// All matches are returned in display order; a `block` never stops the
    /// remaining rules from being checked.
    pub fn evaluate(&self, profile: &PatientProfile, plan_items: &[PlanItem]) -> Vec<SafetyDirective> {
        let mut directives = Vec::new();
        let base = ConditionContext::for_profile(profile);

        for rule in &self.table.rules {
            match rule.scope {
                RuleScope::Profile => {
                    if rule.when.evaluate(&base) {
                        directives.push(directive(rule, None));
                    }
                }
                RuleScope::PlanItem => {
                    for item in plan_items {
                        if rule.when.evaluate(&base.with_plan_item(item)) {
                            directives.push(directive(
                                rule,
                                Some(DirectiveTarget::PlanLine {
                                    line_id: item.line_id.clone(),
                                }),
                            ));
                        }
                    }
                }
                RuleScope::Medication => {
                    for medication in profile.medications() {
                        if rule.when.evaluate(&base.with_medication(medication)) {
                            directives.push(directive(
                                rule,
                                Some(DirectiveTarget::Medication {
                                    code: medication.code.clone(),
                                }),
                            ));
                        }
                    }
                }
            }
        }

        sort_for_display(&mut directives);
        for d in &directives {
            debug!(rule_id = %d.trigger_rule_id, severity = %d.severity, pathway = %d.pathway, "safety rule matched");
        }
        info!(
            rules = self.table.rules.len(),
            plan_items = plan_items.len(),
            directives = directives.len(),
            version = %self.table.version,
            "safety rules evaluated"
        );
        directives
    }
}

fn directive(rule: &SafetyRule, target: Option<DirectiveTarget>) -> SafetyDirective {
    SafetyDirective {
        severity: rule.severity,
        trigger_rule_id: rule.id.clone(),
        message: rule.message.clone(),
        required_action: rule.required_action.clone(),
        pathway: rule.pathway,
        priority: rule.priority,
        target,
        substitute_excluding: rule
            .substitute
            .as_ref()
            .map(|s| s.exclude_classes.clone())
            .unwrap_or_default(),
    }
}
