use medguide_core::ConditionContext;
use medguide_core::models::profile::{LabCode, PatientProfile};
use medguide_core::models::risk::{
    CardiovascularRisk, ContributingFactor, FollowUpPlan, GlycemicControl, RiskAssessment,
};
use tracing::debug;

use crate::table::{CardiovascularRule, FactorKind, RiskTable, TierRule};

/// Compute a full risk assessment. Never fails: inputs that are missing
/// leave the dependent parts empty and are listed in `insufficient_data`.
pub fn assess(profile: &PatientProfile, table: &RiskTable) -> RiskAssessment {
    let mut trace = Vec::new();
    let mut insufficient_data = Vec::new();

    let bp_stage = stage_blood_pressure(profile, table, &mut trace);
    if bp_stage.is_none() {
        insufficient_data.push("bp_stage".to_string());
        trace.push("blood pressure not reported; stage not assigned".to_string());
    }

    let glycemic_control = glycemic_control(profile, table, &mut trace);

    let mut partial = RiskAssessment {
        tier: table.default_tier.clone(),
        contributing_factors: Vec::new(),
        insufficient_data: Vec::new(),
        bp_stage,
        glycemic_control,
        cardiovascular_risk: None,
        follow_up: None,
        table_version: table.version.clone(),
        trace: Vec::new(),
    };

    let mut contributing_factors = Vec::new();
    for factor in &table.factors {
        let missing: Vec<&str> = factor
            .requires
            .iter()
            .filter(|f| !profile.is_known(**f))
            .map(|f| f.as_str())
            .collect();
        if !missing.is_empty() {
            trace.push(format!(
                "factor {} not evaluated: missing {}",
                factor.id,
                missing.join(", ")
            ));
            insufficient_data.push(factor.id.clone());
            continue;
        }
        let ctx = ConditionContext::for_profile(profile).with_risk(&partial);
        if factor.when.evaluate(&ctx) {
            trace.push(format!("factor {} present (weight {})", factor.id, factor.weight));
            contributing_factors.push(ContributingFactor {
                factor: factor.id.clone(),
                label: factor.label.clone(),
                weight: factor.weight,
            });
        }
    }
    partial.contributing_factors = contributing_factors;

    let risk_factor_count = table
        .factors
        .iter()
        .filter(|f| f.counts_as_risk_factor() && partial.has_factor(&f.id))
        .count();
    let has_diabetes_factor = table.factors.iter().any(|f| {
        f.kind == FactorKind::Diabetes && partial.has_factor(&f.id)
    });

    if partial.bp_stage.is_some() || has_diabetes_factor {
        let level = table
            .cardiovascular
            .iter()
            .filter(|rule| cardiovascular_rule_applies(rule, profile, &partial, risk_factor_count))
            .map(|rule| rule.level)
            .max()
            .unwrap_or(CardiovascularRisk::Low);
        trace.push(format!(
            "cardiovascular risk {level} ({risk_factor_count} risk factors)"
        ));
        partial.cardiovascular_risk = Some(level);
        partial.follow_up = table
            .follow_up
            .iter()
            .find(|f| f.level == level)
            .map(|f| FollowUpPlan {
                interval_weeks: f.interval_weeks,
                monitoring: f.monitoring.clone(),
                lifestyle_goals: table.lifestyle_goals.clone(),
            });
    }

    let ctx = ConditionContext::for_profile(profile).with_risk(&partial);
    let mut chosen: Option<&TierRule> = None;
    for rule in &table.tiers {
        if !tier_rule_applies(rule, &partial, &ctx) {
            continue;
        }
        // Equal severity keeps the rule listed first.
        if chosen.is_none_or(|c| rule.severity > c.severity) {
            chosen = Some(rule);
        }
    }
    let tier = chosen.map(TierRule::tier).unwrap_or_else(|| table.default_tier.clone());
    trace.push(format!("tier {} ({})", tier.id, tier.label));

    debug!(
        tier = %tier.id,
        factors = partial.contributing_factors.len(),
        insufficient = insufficient_data.len(),
        table_version = %table.version,
        "risk assessed"
    );

    RiskAssessment {
        tier,
        insufficient_data,
        trace,
        ..partial
    }
}

fn stage_blood_pressure(
    profile: &PatientProfile,
    table: &RiskTable,
    trace: &mut Vec<String>,
) -> Option<String> {
    let bp = profile.blood_pressure()?;
    // Highest stage whose systolic or diastolic floor is met.
    let stage = table
        .bp_stages
        .iter()
        .rev()
        .find(|s| bp.systolic >= s.systolic_min || bp.diastolic.is_some_and(|d| d >= s.diastolic_min));
    let (id, label) = match stage {
        Some(s) => (s.id.clone(), s.label.as_str()),
        None => (table.normal_stage.id.clone(), table.normal_stage.label.as_str()),
    };
    trace.push(format!("blood pressure {bp} -> {label}"));
    Some(id)
}

fn glycemic_control(
    profile: &PatientProfile,
    table: &RiskTable,
    trace: &mut Vec<String>,
) -> Option<GlycemicControl> {
    if let Some(hba1c) = profile.lab(LabCode::Hba1c) {
        let control = table.glycemic.hba1c.classify(hba1c);
        trace.push(format!("HbA1c {hba1c}% -> {control:?} glycaemic control"));
        return Some(control);
    }
    if let Some(glucose) = profile.lab(LabCode::FastingGlucose) {
        let control = table.glycemic.fasting_glucose.classify(glucose);
        trace.push(format!(
            "fasting glucose {glucose} mmol/L -> {control:?} glycaemic control"
        ));
        return Some(control);
    }
    None
}

fn cardiovascular_rule_applies(
    rule: &CardiovascularRule,
    profile: &PatientProfile,
    partial: &RiskAssessment,
    risk_factor_count: usize,
) -> bool {
    if !rule.bp_stages.is_empty()
        && !partial
            .bp_stage
            .as_ref()
            .is_some_and(|stage| rule.bp_stages.contains(stage))
    {
        return false;
    }
    if rule.min_risk_factors.is_some_and(|min| risk_factor_count < min) {
        return false;
    }
    if !rule.any_factors.is_empty() && !rule.any_factors.iter().any(|f| partial.has_factor(f)) {
        return false;
    }
    if !rule.all_factors.iter().all(|f| partial.has_factor(f)) {
        return false;
    }
    rule.when.as_ref().is_none_or(|c| {
        c.evaluate(&ConditionContext::for_profile(profile).with_risk(partial))
    })
}

fn tier_rule_applies(rule: &TierRule, partial: &RiskAssessment, ctx: &ConditionContext<'_>) -> bool {
    if !rule.bp_stages.is_empty()
        && !partial
            .bp_stage
            .as_ref()
            .is_some_and(|stage| rule.bp_stages.contains(stage))
    {
        return false;
    }
    if !rule.glycemic.is_empty()
        && !partial
            .glycemic_control
            .is_some_and(|c| rule.glycemic.contains(&c))
    {
        return false;
    }
    rule.when.as_ref().is_none_or(|c| c.evaluate(ctx))
}
