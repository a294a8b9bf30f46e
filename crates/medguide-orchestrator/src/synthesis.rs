//! Deterministic synthesis of the differential and the draft plan.
//!
//! Catalog `when` predicates are evaluated on the profile alone, so the
//! evidence query can be built before the risk result is joined. Risk
//! output only feeds score boosts. A candidate is kept only if at least
//! one item of the fused evidence bundle mentions one of its evidence
//! terms.

use std::collections::BTreeSet;

use medguide_core::ConditionContext;
use medguide_core::models::differential::DifferentialEntry;
use medguide_core::models::evidence::{EvidenceId, EvidenceItem};
use medguide_core::models::plan::{LineProvenance, PlanCategory, PlanItem};
use medguide_core::models::profile::PatientProfile;
use medguide_core::models::provenance::ProvenanceEvent;
use medguide_core::models::risk::RiskAssessment;
use tracing::debug;

use crate::catalog::{DiagnosisRule, TreatmentRule};
use crate::rules::RuleSet;

/// Evidence items cited per diagnosis.
const DIAGNOSIS_CITATIONS: usize = 3;
/// Evidence items cited per plan line.
const LINE_CITATIONS: usize = 2;

/// Catalog entries whose predicates hold for the profile.
#[derive(Debug, Clone, Default)]
pub struct Screened<'r> {
    pub diagnoses: Vec<&'r DiagnosisRule>,
    pub treatments: Vec<&'r TreatmentRule>,
    /// Substitute-only entries that could replace a blocked line.
    pub substitutes: Vec<&'r TreatmentRule>,
}

/// A plan line before gating.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftLine {
    pub item: PlanItem,
    pub rank: u32,
    pub provenance: Vec<LineProvenance>,
    pub substituted_for: Option<String>,
}

pub fn screen<'r>(profile: &PatientProfile, rules: &'r RuleSet) -> Screened<'r> {
    let ctx = ConditionContext::for_profile(profile);

    let diagnoses = rules
        .diagnoses
        .diagnoses
        .iter()
        .filter(|d| d.when.evaluate(&ctx))
        .collect();

    let mut treatments = Vec::new();
    let mut substitutes = Vec::new();
    for rule in &rules.treatments.treatments {
        if !rule.when.evaluate(&ctx) || already_taking(profile, rule) {
            continue;
        }
        if rule.substitute_only {
            substitutes.push(rule);
        } else {
            treatments.push(rule);
        }
    }

    Screened {
        diagnoses,
        treatments,
        substitutes,
    }
}

/// A drug line for a class the patient already takes is not proposed again.
fn already_taking(profile: &PatientProfile, rule: &TreatmentRule) -> bool {
    rule.drug_class.as_ref().is_some_and(|class| {
        profile
            .medications()
            .any(|m| m.drug_class.as_ref() == Some(class))
    })
}

/// Canonical codes to retrieve evidence for: every screened candidate's
/// evidence terms plus the profile's own comorbidities.
pub fn query_terms(profile: &PatientProfile, screened: &Screened<'_>) -> Vec<String> {
    let mut terms: BTreeSet<String> = BTreeSet::new();
    for d in &screened.diagnoses {
        terms.extend(d.evidence_terms.iter().cloned());
    }
    for t in screened.treatments.iter().chain(&screened.substitutes) {
        terms.extend(t.evidence_terms.iter().cloned());
    }
    terms.extend(profile.comorbidities().map(str::to_string));
    terms.into_iter().collect()
}

fn supporting<'b>(
    evidence_terms: &'b [String],
    bundle: &'b [EvidenceItem],
) -> impl Iterator<Item = &'b EvidenceItem> {
    bundle
        .iter()
        .filter(move |item| evidence_terms.iter().any(|t| item.mentions(t)))
}

/// Scores, backs and ranks the screened diagnoses. Candidates without
/// evidence are left out and reported.
pub fn build_differential(
    profile: &PatientProfile,
    risk: &RiskAssessment,
    candidates: &[&DiagnosisRule],
    bundle: &[EvidenceItem],
) -> (Vec<DifferentialEntry>, Vec<ProvenanceEvent>) {
    let ctx = ConditionContext::for_profile(profile).with_risk(risk);
    let mut entries = Vec::new();
    let mut events = Vec::new();

    for rule in candidates {
        let evidence: BTreeSet<EvidenceId> = supporting(&rule.evidence_terms, bundle)
            .take(DIAGNOSIS_CITATIONS)
            .map(EvidenceItem::id)
            .collect();
        if evidence.is_empty() {
            debug!(diagnosis = %rule.code, "no supporting evidence; omitted");
            events.push(ProvenanceEvent::DiagnosisOmitted {
                diagnosis_code: rule.code.clone(),
            });
            continue;
        }

        let boost: f64 = rule
            .boosts
            .iter()
            .filter(|b| b.when.evaluate(&ctx))
            .map(|b| b.score)
            .sum();
        entries.push(DifferentialEntry {
            diagnosis_code: rule.code.clone(),
            label: rule.label.clone(),
            supporting_evidence: evidence,
            rank: 0,
            score: ((rule.base_score + boost).clamp(0.0, 1.0) * 100.0).round() / 100.0,
        });
    }

    entries.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.diagnosis_code.cmp(&b.diagnosis_code))
    });
    for (i, entry) in entries.iter_mut().enumerate() {
        entry.rank = i as u32 + 1;
    }
    (entries, events)
}

/// Evidence provenance for a candidate line, strongest items first.
pub fn line_provenance(rule: &TreatmentRule, bundle: &[EvidenceItem]) -> Vec<LineProvenance> {
    supporting(&rule.evidence_terms, bundle)
        .take(LINE_CITATIONS)
        .map(|item| LineProvenance::Evidence {
            evidence_id: item.id(),
            locator: item.locator().clone(),
            grade: item.grade(),
        })
        .collect()
}

/// Draft lines for the screened treatments. Lines without evidence are
/// dropped and reported.
pub fn draft_plan(candidates: &[&TreatmentRule], bundle: &[EvidenceItem]) -> (Vec<DraftLine>, Vec<ProvenanceEvent>) {
    let mut lines = Vec::new();
    let mut events = Vec::new();

    for rule in candidates {
        let provenance = line_provenance(rule, bundle);
        if provenance.is_empty() {
            debug!(line_id = %rule.id, "no supporting evidence; omitted");
            events.push(ProvenanceEvent::PlanLineOmitted {
                line_id: rule.id.clone(),
            });
            continue;
        }
        lines.push(DraftLine {
            item: rule.to_item(),
            rank: rule.priority,
            provenance,
            substituted_for: None,
        });
    }
    (lines, events)
}

/// Review line derived from the risk table's follow-up schedule.
pub fn follow_up_line(risk: &RiskAssessment, today: jiff::civil::Date) -> Option<DraftLine> {
    let follow_up = risk.follow_up.as_ref()?;
    let level = risk.cardiovascular_risk?;

    let weeks = i64::from(follow_up.interval_weeks);
    let next_visit = today.checked_add(jiff::Span::new().weeks(weeks)).ok()?;
    let mut text = format!(
        "Review in {} weeks (on or after {next_visit}).",
        follow_up.interval_weeks
    );
    if !follow_up.monitoring.is_empty() {
        text.push_str(&format!(" Monitor: {}.", follow_up.monitoring.join(", ")));
    }

    Some(DraftLine {
        item: PlanItem {
            line_id: "follow-up".to_string(),
            category: PlanCategory::Monitoring,
            drug_class: None,
            drug: None,
            text,
        },
        rank: u32::MAX,
        provenance: vec![LineProvenance::Rule {
            table_version: risk.table_version.clone(),
            rule_id: format!("follow_up:{level}"),
        }],
        substituted_for: None,
    })
}
