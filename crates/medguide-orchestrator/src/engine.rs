//! The turn cycle.
//!
//! One call to [`Engine::handle_turn`] runs one pass of
//! `Intake -> (Clarifying | Assessing -> Drafting -> SafetyGating) -> terminal`
//! for one session. Recoverable failures end the pass in a structured
//! response that still carries whatever succeeded; only session errors are
//! returned as `Err`.

use std::collections::BTreeSet;
use std::sync::Arc;

use medguide_audit::AuditEvent;
use medguide_core::generation::{GenerationRequest, TextGenerator};
use medguide_core::models::differential::DifferentialEntry;
use medguide_core::models::evidence::{EvidenceId, EvidenceItem};
use medguide_core::models::interview::{InterviewPhase, Speaker};
use medguide_core::models::plan::PlanLine;
use medguide_core::models::profile::{FieldId, PatientProfile, TurnId};
use medguide_core::models::provenance::ProvenanceEvent;
use medguide_core::models::risk::RiskAssessment;
use medguide_core::models::safety::{SafetyDirective, Severity};
use medguide_evidence::{fuse, EvidenceFilters, EvidenceStore, PatientChart, QueryContext, RecordStore};
use medguide_safety::{render_report, RuleConflict, SafetyGuard};
use medguide_terms::Normalizer;
use tracing::{error, info, warn};

use crate::clarify::{exhausted, missing_fields, next_question};
use crate::config::EngineConfig;
use crate::error::OrchestratorError;
use crate::gating::{gate, target_label};
use crate::intake::{apply, reconcile_ambiguities, seed_from_chart};
use crate::render::{
    assessment_lines, insufficient_disclosure, objective_lines, plan_lines, render_summary, soap_note,
    CLARIFYING_DISCLOSURE, DEGRADED_DISCLOSURE, DELIVERED_DISCLOSURE, SYSTEM_PROMPT, WITHHELD_DISCLOSURE,
};
use crate::response::{NarrativeSource, Notice, NoticeKind, PatientReview, Question, TurnRequest, TurnResponse};
use crate::rules::RuleSet;
use crate::session::{ArchivedSession, Session, SessionRegistry};
use crate::synthesis::{build_differential, draft_plan, follow_up_line, query_terms, screen};

pub type Clock = Arc<dyn Fn() -> jiff::Timestamp + Send + Sync>;

/// What a pass produced, before it is rendered into a response.
#[derive(Debug, Default)]
struct Outcome {
    question: Option<Question>,
    differential: Vec<DifferentialEntry>,
    plan: Vec<PlanLine>,
    risk: Option<RiskAssessment>,
    directives: Vec<SafetyDirective>,
    conflicts: Vec<RuleConflict>,
    provenance: Vec<EvidenceItem>,
    events: Vec<ProvenanceEvent>,
    notices: Vec<Notice>,
    disclosure: String,
    narrative: Option<(String, NarrativeSource)>,
}

pub struct Engine {
    config: EngineConfig,
    rules: Arc<RuleSet>,
    normalizer: Normalizer,
    guard: SafetyGuard,
    evidence: Arc<EvidenceStore>,
    patients: Option<Arc<dyn RecordStore>>,
    generator: Option<Arc<dyn TextGenerator>>,
    sessions: SessionRegistry,
    clock: Clock,
}

impl Engine {
    pub fn new(config: EngineConfig, rules: RuleSet, evidence: EvidenceStore) -> Result<Self, OrchestratorError> {
        config.validate()?;
        let normalizer = Normalizer::new(rules.lexicon.clone(), config.ambiguity_threshold);
        let guard = SafetyGuard::new(rules.safety.clone());
        info!(
            sources = ?evidence.source_names(),
            safety_rules = %guard.version(),
            "engine ready"
        );
        Ok(Self {
            config,
            rules: Arc::new(rules),
            normalizer,
            guard,
            evidence: Arc::new(evidence),
            patients: None,
            generator: None,
            sessions: SessionRegistry::new(),
            clock: Arc::new(jiff::Timestamp::now),
        })
    }

    pub fn with_generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        info!(model = %generator.model_id(), "text generation enabled");
        self.generator = Some(generator);
        self
    }

    /// Sessions for a patient with a chart in `store` start from that chart.
    pub fn with_patient_records(mut self, store: Arc<dyn RecordStore>) -> Self {
        self.patients = Some(store);
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Opens a session. The profile is seeded from the patient's chart when
    /// one exists; a chart that cannot be read is reported with the first
    /// turn and the session starts empty.
    pub async fn start_session(&self, patient_id: &str) -> String {
        let now = (self.clock)();
        let mut profile = PatientProfile::new(patient_id);
        let mut pending = Vec::new();
        match self.load_chart(patient_id).await {
            Ok(Some(chart)) => {
                let seeded = seed_from_chart(&mut profile, &chart, now);
                info!(patient_id = %patient_id, fields = seeded.len(), "session seeded from chart");
            }
            Ok(None) => {}
            Err(e) => {
                warn!(patient_id = %patient_id, error = %e, "patient chart unavailable");
                pending.push(Notice::new(
                    NoticeKind::ChartUnavailable,
                    format!("patient chart could not be loaded: {e}"),
                ));
            }
        }
        self.sessions.create(profile, pending, now)
    }

    /// Risk staging and medication safety for a charted patient, outside any
    /// interview.
    pub async fn review_patient(&self, patient_id: &str) -> Result<PatientReview, OrchestratorError> {
        let chart = self
            .load_chart(patient_id)
            .await?
            .ok_or_else(|| OrchestratorError::PatientNotFound(patient_id.to_string()))?;
        let mut profile = PatientProfile::new(patient_id);
        seed_from_chart(&mut profile, &chart, (self.clock)());

        let risk = medguide_risk::assess(&profile, &self.rules.risk);
        let directives = self.guard.evaluate_profile(&profile);
        info!(
            patient_id = %patient_id,
            tier = %risk.tier.label,
            directives = directives.len(),
            "patient reviewed"
        );
        Ok(PatientReview {
            patient_id: patient_id.to_string(),
            safety_report: render_report(&directives, &[]),
            risk_assessment: risk,
            safety_directives: directives,
            profile,
            table_versions: self.rules.versions(),
        })
    }

    async fn load_chart(&self, patient_id: &str) -> Result<Option<PatientChart>, OrchestratorError> {
        let Some(store) = &self.patients else {
            return Ok(None);
        };
        let timeout = self.config.evidence_timeout();
        match tokio::time::timeout(timeout, store.patient_chart(patient_id)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(OrchestratorError::SourceUnavailable {
                sources: "patient records".to_string(),
                reason: format!("no answer within {} ms", timeout.as_millis()),
            }),
        }
    }

    pub fn end_session(&self, session_id: &str) -> Result<ArchivedSession, OrchestratorError> {
        self.sessions.remove(session_id, (self.clock)())
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Runs one turn. Fails only with `SessionNotFound`, `SessionBusy` or an
    /// internal state error; everything else is reported in the response.
    pub async fn handle_turn(&self, request: TurnRequest) -> Result<TurnResponse, OrchestratorError> {
        let mut session = self.sessions.acquire(&request.session_id)?;
        let now = (self.clock)();

        let phase = session.state.phase();
        if phase.is_interrupted() {
            warn!(session_id = %session.id, phase = %phase, "previous turn was dropped mid-pass; restarting at intake");
        }
        if phase != InterviewPhase::Intake {
            session.state.transition(InterviewPhase::Intake)?;
        }
        let turn = session.state.begin_turn();
        let utterance = request.utterance.trim();
        if !utterance.is_empty() {
            session.state.record(turn, Speaker::Patient, utterance);
            session.state.subjective.push(utterance.to_string());
        }

        let outcome = self.run(&mut session, &request, turn, now).await?;
        self.finish(&mut session, turn, outcome)
    }

    async fn run(
        &self,
        session: &mut Session,
        request: &TurnRequest,
        turn: TurnId,
        now: jiff::Timestamp,
    ) -> Result<Outcome, OrchestratorError> {
        let Session {
            id,
            profile,
            state,
            pending_notices,
            ..
        } = session;
        let mut notices = std::mem::take(pending_notices);

        let intake = apply(profile, turn, now, &self.normalizer, &request.utterance, &request.fields);
        reconcile_ambiguities(state, &intake.normalization, profile);
        state.objective = objective_lines(profile);
        state.assessment.clear();
        state.plan.clear();

        let preemptive = self.guard.evaluate_profile(profile);
        let emergency = preemptive.iter().any(SafetyDirective::is_emergency);
        let max_rounds = self.config.max_clarification_rounds;

        let missing = missing_fields(profile, &self.config.required_fields);
        state.missing_fields = missing.clone();

        if emergency {
            warn!(session_id = %id, turn = turn.0, "emergency directive; clarification skipped");
        } else if let Some(question) = next_question(state, &missing, max_rounds) {
            state.mark_asked(&question.key);
            state.transition(InterviewPhase::Clarifying)?;
            info!(session_id = %id, turn = turn.0, key = %question.key, "clarification requested");
            return Ok(Outcome {
                question: Some(question),
                risk: Some(medguide_risk::assess(profile, &self.rules.risk)),
                directives: preemptive,
                notices,
                disclosure: CLARIFYING_DISCLOSURE.to_string(),
                ..Outcome::default()
            });
        } else {
            let unanswered = exhausted(state, &missing, max_rounds);
            if !unanswered.is_empty() {
                let names: Vec<&str> = unanswered.iter().map(|f| f.as_str()).collect();
                notices.push(Notice::new(
                    NoticeKind::ClarificationLimit,
                    format!("no answer after {max_rounds} questions for: {}", names.join(", ")),
                ));
            }
        }

        state.transition(InterviewPhase::Assessing)?;

        let required: &[FieldId] = if emergency {
            &[FieldId::BloodPressure]
        } else {
            self.config.required_fields.as_slice()
        };
        let unmet: Vec<FieldId> = required.iter().copied().filter(|f| !profile.is_known(*f)).collect();
        if !unmet.is_empty() {
            state.transition(InterviewPhase::Insufficient)?;
            let names: Vec<&str> = unmet.iter().map(|f| f.as_str()).collect();
            let reason = OrchestratorError::DataInsufficient(format!("missing {}", names.join(", ")));
            info!(session_id = %id, turn = turn.0, error = %reason, "assessment not possible");
            notices.push(Notice::new(NoticeKind::DataInsufficient, reason.to_string()));
            return Ok(Outcome {
                risk: Some(medguide_risk::assess(profile, &self.rules.risk)),
                directives: preemptive,
                notices,
                disclosure: insufficient_disclosure(&unmet, None),
                ..Outcome::default()
            });
        }

        let profile: &PatientProfile = profile;
        let screened = screen(profile, &self.rules);
        let terms = query_terms(profile, &screened);
        let filters = EvidenceFilters::default();

        let retrieval = async {
            let timeout = self.config.evidence_timeout();
            match tokio::time::timeout(timeout, self.evidence.query(&terms, &filters, now)).await {
                Ok(result) => result.map_err(OrchestratorError::from),
                Err(_) => Err(OrchestratorError::SourceUnavailable {
                    sources: self.evidence.source_names().join(", "),
                    reason: format!("no answer within {} ms", timeout.as_millis()),
                }),
            }
        };
        let (risk, directives, retrieved) = tokio::join!(
            async { medguide_risk::assess(profile, &self.rules.risk) },
            async { self.guard.evaluate_profile(profile) },
            retrieval,
        );

        let items = match retrieved {
            Ok(items) => items,
            Err(e) => {
                state.transition(InterviewPhase::Error)?;
                let (sources, reason) = match e {
                    OrchestratorError::SourceUnavailable { sources, reason } => (sources, reason),
                    other => ("evidence".to_string(), other.to_string()),
                };
                warn!(session_id = %id, turn = turn.0, sources = %sources, reason = %reason, "evidence retrieval unavailable");
                notices.push(Notice::new(
                    NoticeKind::EvidenceUnavailable,
                    format!("evidence retrieval unavailable: {reason}"),
                ));
                return Ok(Outcome {
                    risk: Some(risk),
                    directives,
                    events: vec![ProvenanceEvent::EvidenceUnavailable {
                        sources: sources.split(", ").map(str::to_string).collect(),
                        reason,
                    }],
                    notices,
                    disclosure: DEGRADED_DISCLOSURE.to_string(),
                    ..Outcome::default()
                });
            }
        };
        let bundle = fuse(&QueryContext { terms }, items, &self.config.fusion());

        state.transition(InterviewPhase::Drafting)?;
        let (differential, mut events) = build_differential(profile, &risk, &screened.diagnoses, &bundle);
        if differential.len() < self.config.min_differential {
            state.transition(InterviewPhase::Insufficient)?;
            let detail = format!(
                "Only {} of the minimum {} diagnoses are supported by the available evidence.",
                differential.len(),
                self.config.min_differential
            );
            info!(session_id = %id, turn = turn.0, supported = differential.len(), "differential too short");
            notices.push(Notice::new(
                NoticeKind::DataInsufficient,
                OrchestratorError::DataInsufficient(detail.clone()).to_string(),
            ));
            return Ok(Outcome {
                risk: Some(risk),
                directives,
                events,
                notices,
                disclosure: insufficient_disclosure(&[], Some(&detail)),
                ..Outcome::default()
            });
        }

        let (mut draft, omitted) = draft_plan(&screened.treatments, &bundle);
        events.extend(omitted);
        let today = now.to_zoned(jiff::tz::TimeZone::UTC).date();
        draft.extend(follow_up_line(&risk, today));

        state.transition(InterviewPhase::SafetyGating)?;
        let gated = gate(draft, &screened.substitutes, profile, &self.guard, &bundle);
        events.extend(gated.events);
        for conflict in &gated.conflicts {
            let e = OrchestratorError::RuleConflict {
                target: target_label(&conflict.target),
                rule_ids: conflict.rule_ids.clone(),
            };
            notices.push(Notice::new(
                NoticeKind::RuleConflict,
                format!("{e}; applied the stricter action ({})", conflict.effective),
            ));
        }

        let cited: BTreeSet<EvidenceId> = differential
            .iter()
            .flat_map(|e| e.supporting_evidence.iter().copied())
            .chain(gated.lines.iter().flat_map(|l| l.evidence_ids()))
            .collect();
        let provenance: Vec<EvidenceItem> = bundle.into_iter().filter(|i| cited.contains(&i.id())).collect();

        if let Err(violation) = check_invariants(
            &differential,
            &gated.lines,
            &gated.directives,
            &provenance,
            self.config.min_differential,
        ) {
            error!(session_id = %id, turn = turn.0, error = %violation, "result withheld");
            state.transition(InterviewPhase::Error)?;
            notices.push(Notice::new(NoticeKind::InvariantViolation, violation.to_string()));
            return Ok(Outcome {
                risk: Some(risk),
                directives: gated.directives,
                conflicts: gated.conflicts,
                events,
                notices,
                disclosure: WITHHELD_DISCLOSURE.to_string(),
                ..Outcome::default()
            });
        }

        state.transition(InterviewPhase::Delivered)?;
        let notice_text: Vec<String> = notices.iter().map(|n| n.message.clone()).collect();
        let summary = render_summary(Some(&risk), &gated.directives, &differential, &gated.lines, &notice_text)?;
        let history: Vec<String> = state
            .recent_transcript(self.config.history_window)
            .iter()
            .map(|t| {
                let who = match t.speaker {
                    Speaker::Patient => "clinician",
                    Speaker::Engine => "assistant",
                };
                format!("{who}: {}", t.text)
            })
            .collect();
        let narrative = self.phrase(id, summary, &provenance, history, &mut events, &mut notices).await;

        Ok(Outcome {
            question: None,
            differential,
            plan: gated.lines,
            risk: Some(risk),
            directives: gated.directives,
            conflicts: gated.conflicts,
            provenance,
            events,
            notices,
            disclosure: DELIVERED_DISCLOSURE.to_string(),
            narrative: Some(narrative),
        })
    }

    /// Phrases the summary through the generator when one is configured.
    /// Any failure falls back to the summary itself.
    async fn phrase(
        &self,
        session_id: &str,
        summary: String,
        provenance: &[EvidenceItem],
        history: Vec<String>,
        events: &mut Vec<ProvenanceEvent>,
        notices: &mut Vec<Notice>,
    ) -> (String, NarrativeSource) {
        let Some(generator) = &self.generator else {
            return (summary, NarrativeSource::Template);
        };

        let request = GenerationRequest {
            session_id: session_id.to_string(),
            system_prompt: SYSTEM_PROMPT.to_string(),
            structured_summary: summary,
            evidence_context: provenance
                .iter()
                .map(|i| (i.locator().to_string(), i.text().to_string()))
                .collect(),
            history,
        };

        let timeout = self.config.generation_timeout();
        let reason = match tokio::time::timeout(timeout, generator.generate(&request)).await {
            Ok(Ok(text)) => return (text, NarrativeSource::Generated),
            Ok(Err(e)) => {
                warn!(session_id = %session_id, error = %e, "generation failed; using template");
                notices.push(Notice::new(
                    NoticeKind::GenerationFailed,
                    format!("phrasing unavailable ({e}); showing the structured summary"),
                ));
                e.to_string()
            }
            Err(_) => {
                let e = OrchestratorError::GenerationTimeout(self.config.generation_timeout_ms);
                warn!(session_id = %session_id, error = %e, "generation timed out; using template");
                notices.push(Notice::new(
                    NoticeKind::GenerationTimeout,
                    format!("{e}; showing the structured summary"),
                ));
                e.to_string()
            }
        };
        events.push(ProvenanceEvent::GenerationFallback { reason });
        (request.structured_summary, NarrativeSource::Template)
    }

    /// Renders the outcome, updates the note and transcript and emits audit
    /// events.
    fn finish(&self, session: &mut Session, turn: TurnId, outcome: Outcome) -> Result<TurnResponse, OrchestratorError> {
        let Session { id, state, .. } = session;

        if state.phase() == InterviewPhase::Delivered {
            state.assessment = assessment_lines(outcome.risk.as_ref(), &outcome.differential);
            state.plan = plan_lines(&outcome.plan);
        } else {
            state.assessment = assessment_lines(outcome.risk.as_ref(), &[]);
        }

        let (narrative, narrative_source) = match outcome.narrative {
            Some(narrative) => narrative,
            None => {
                let notices: Vec<String> = outcome.notices.iter().map(|n| n.message.clone()).collect();
                let summary = render_summary(
                    outcome.risk.as_ref(),
                    &outcome.directives,
                    &outcome.differential,
                    &outcome.plan,
                    &notices,
                )?;
                (summary, NarrativeSource::Template)
            }
        };

        let engine_text = match &outcome.question {
            Some(question) => question.text.clone(),
            None => narrative.clone(),
        };
        state.record(turn, Speaker::Engine, engine_text);

        for event in &outcome.events {
            AuditEvent::from_provenance(id, event).emit();
        }

        info!(
            session_id = %id,
            turn = turn.0,
            state = %state.phase(),
            differential = outcome.differential.len(),
            plan_lines = outcome.plan.len(),
            directives = outcome.directives.len(),
            notices = outcome.notices.len(),
            "turn completed"
        );

        Ok(TurnResponse {
            session_id: id.clone(),
            turn,
            state: state.phase(),
            question: outcome.question,
            differential: outcome.differential,
            plan: outcome.plan,
            risk_assessment: outcome.risk,
            safety_report: render_report(&outcome.directives, &outcome.conflicts),
            safety_directives: outcome.directives,
            provenance: outcome.provenance,
            events: outcome.events,
            notices: outcome.notices,
            disclosure_text: outcome.disclosure,
            narrative,
            narrative_source,
            soap: soap_note(state),
            table_versions: self.rules.versions(),
        })
    }
}

/// Checks that must hold before anything is delivered.
fn check_invariants(
    differential: &[DifferentialEntry],
    plan: &[PlanLine],
    directives: &[SafetyDirective],
    provenance: &[EvidenceItem],
    min_differential: usize,
) -> Result<(), OrchestratorError> {
    if differential.len() < min_differential {
        return Err(OrchestratorError::InvariantViolation(format!(
            "differential has {} entries, fewer than {min_differential}",
            differential.len()
        )));
    }

    let surfaced: BTreeSet<EvidenceId> = provenance.iter().map(EvidenceItem::id).collect();
    for entry in differential {
        if entry.supporting_evidence.is_empty() {
            return Err(OrchestratorError::InvariantViolation(format!(
                "diagnosis {} has no supporting evidence",
                entry.diagnosis_code
            )));
        }
        if let Some(missing) = entry.supporting_evidence.iter().find(|e| !surfaced.contains(e)) {
            return Err(OrchestratorError::InvariantViolation(format!(
                "diagnosis {} cites evidence {missing} missing from provenance",
                entry.diagnosis_code
            )));
        }
    }

    for line in plan {
        if line.provenance.is_empty() {
            return Err(OrchestratorError::InvariantViolation(format!(
                "plan line {} has no provenance",
                line.line_id()
            )));
        }
        if let Some(block) = directives
            .iter()
            .find(|d| d.severity == Severity::Block && d.targets_line(line.line_id()))
        {
            return Err(OrchestratorError::InvariantViolation(format!(
                "plan line {} survived block {}",
                line.line_id(),
                block.trigger_rule_id
            )));
        }
    }
    Ok(())
}
