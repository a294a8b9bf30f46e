mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{engine, engine_with_config, passages, record_store, tables, test_config, ts};
use medguide_core::BoxFuture;
use medguide_core::generation::{GenerationError, GenerationRequest, TextGenerator};
use medguide_core::models::evidence::{EvidenceItem, Locator, SourceKind};
use medguide_core::models::interview::{InterviewPhase, Speaker};
use medguide_core::models::provenance::ProvenanceEvent;
use medguide_evidence::{
    DocumentSource, EvidenceError, EvidenceFilters, EvidenceSource, EvidenceStore, RelationalSource, TableSource,
};
use medguide_orchestrator::{
    Engine, EngineConfig, NarrativeSource, NoticeKind, OrchestratorError, RuleSet, TurnRequest,
};
use tokio::sync::Notify;

const DIABETIC_MAN: &str = "58-year-old man, BMI 28.5, blood pressure 168/98, known type 2 diabetes";

/// Records every request and answers with a fixed note.
#[derive(Default)]
struct RecordingGenerator {
    requests: Mutex<Vec<GenerationRequest>>,
}

impl TextGenerator for RecordingGenerator {
    fn model_id(&self) -> &str {
        "recording"
    }

    fn generate<'a>(&'a self, request: &'a GenerationRequest) -> BoxFuture<'a, Result<String, GenerationError>> {
        self.requests.lock().unwrap().push(request.clone());
        Box::pin(async { Ok("Phrased clinical note.".to_string()) })
    }
}

/// Blocks inside `generate` until released.
struct GatedGenerator {
    entered: Notify,
    release: Notify,
}

impl TextGenerator for GatedGenerator {
    fn model_id(&self) -> &str {
        "gated"
    }

    fn generate<'a>(&'a self, _request: &'a GenerationRequest) -> BoxFuture<'a, Result<String, GenerationError>> {
        Box::pin(async move {
            self.entered.notify_one();
            self.release.notified().await;
            Ok("Phrased after release.".to_string())
        })
    }
}

struct SlowGenerator;

impl TextGenerator for SlowGenerator {
    fn model_id(&self) -> &str {
        "slow"
    }

    fn generate<'a>(&'a self, _request: &'a GenerationRequest) -> BoxFuture<'a, Result<String, GenerationError>> {
        Box::pin(async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok("too late".to_string())
        })
    }
}

struct FailingGenerator;

impl TextGenerator for FailingGenerator {
    fn model_id(&self) -> &str {
        "failing"
    }

    fn generate<'a>(&'a self, _request: &'a GenerationRequest) -> BoxFuture<'a, Result<String, GenerationError>> {
        Box::pin(async { Err(GenerationError::Service("throttled".to_string())) })
    }
}

/// Guideline source whose first query hangs until the caller gives up.
struct StallingSource {
    inner: DocumentSource,
    stalled: AtomicBool,
}

impl EvidenceSource for StallingSource {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn kind(&self) -> SourceKind {
        self.inner.kind()
    }

    fn query<'a>(
        &'a self,
        terms: &'a [String],
        filters: &'a EvidenceFilters,
    ) -> BoxFuture<'a, Result<Vec<EvidenceItem>, EvidenceError>> {
        Box::pin(async move {
            if !self.stalled.swap(true, Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            self.inner.query(terms, filters).await
        })
    }

    fn resolve<'a>(&'a self, locator: &'a Locator) -> BoxFuture<'a, Result<Option<EvidenceItem>, EvidenceError>> {
        self.inner.resolve(locator)
    }

    fn updated_since<'a>(
        &'a self,
        since: jiff::Timestamp,
    ) -> BoxFuture<'a, Result<Vec<EvidenceItem>, EvidenceError>> {
        self.inner.updated_since(since)
    }
}

fn engine_with_stalling_guidelines() -> Engine {
    let guidelines = StallingSource {
        inner: DocumentSource::in_memory("guidelines", &passages()).unwrap(),
        stalled: AtomicBool::new(false),
    };
    let evidence = EvidenceStore::new(1825)
        .with_source(Arc::new(guidelines))
        .with_source(Arc::new(TableSource::new("statistics", tables())))
        .with_source(Arc::new(RelationalSource::new("records", record_store())));
    let config = EngineConfig {
        evidence_timeout_ms: 60_000,
        ..test_config()
    };
    Engine::new(config, RuleSet::bundled().unwrap(), evidence)
        .unwrap()
        .with_clock(Arc::new(|| ts("2025-01-01")))
}

#[tokio::test]
async fn unknown_session_is_rejected() {
    let engine = engine();
    let err = engine
        .handle_turn(TurnRequest::new("missing", DIABETIC_MAN))
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::SessionNotFound(id) if id == "missing"));
}

#[tokio::test]
async fn generator_phrases_the_computed_result() {
    let generator = Arc::new(RecordingGenerator::default());
    let engine = engine().with_generator(generator.clone());
    let session = engine.start_session("p-020").await;

    let response = engine.handle_turn(TurnRequest::new(&session, DIABETIC_MAN)).await.unwrap();

    assert_eq!(response.state, InterviewPhase::Delivered);
    assert_eq!(response.narrative, "Phrased clinical note.");
    assert_eq!(response.narrative_source, NarrativeSource::Generated);

    let requests = generator.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.session_id, session);
    assert!(request.system_prompt.contains("Do not add diagnoses"));
    assert!(request.structured_summary.contains("Plan:"));
    assert!(!request.evidence_context.is_empty());
    assert_eq!(request.history, vec![format!("clinician: {DIABETIC_MAN}")]);
}

#[tokio::test]
async fn generation_timeout_falls_back_to_the_template() {
    let config = EngineConfig {
        generation_timeout_ms: 50,
        ..test_config()
    };
    let engine = engine_with_config(config, record_store()).with_generator(Arc::new(SlowGenerator));
    let session = engine.start_session("p-021").await;

    let response = engine.handle_turn(TurnRequest::new(&session, DIABETIC_MAN)).await.unwrap();

    assert_eq!(response.state, InterviewPhase::Delivered);
    assert_eq!(response.narrative_source, NarrativeSource::Template);
    assert!(response.narrative.contains("Plan:"));
    assert!(response.has_notice(NoticeKind::GenerationTimeout));
    assert!(!response.plan.is_empty());
    assert!(
        response
            .events
            .iter()
            .any(|e| matches!(e, ProvenanceEvent::GenerationFallback { .. }))
    );
}

#[tokio::test]
async fn generation_failure_falls_back_to_the_template() {
    let engine = engine().with_generator(Arc::new(FailingGenerator));
    let session = engine.start_session("p-022").await;

    let response = engine.handle_turn(TurnRequest::new(&session, DIABETIC_MAN)).await.unwrap();

    assert_eq!(response.state, InterviewPhase::Delivered);
    assert_eq!(response.narrative_source, NarrativeSource::Template);
    assert!(response.has_notice(NoticeKind::GenerationFailed));
    assert!(!response.has_notice(NoticeKind::GenerationTimeout));
}

#[tokio::test]
async fn concurrent_turn_on_the_same_session_is_busy() {
    let generator = Arc::new(GatedGenerator {
        entered: Notify::new(),
        release: Notify::new(),
    });
    let engine = Arc::new(engine().with_generator(generator.clone()));
    let session = engine.start_session("p-023").await;

    let first = tokio::spawn({
        let engine = engine.clone();
        let session = session.clone();
        async move { engine.handle_turn(TurnRequest::new(&session, DIABETIC_MAN)).await }
    });

    generator.entered.notified().await;
    let second = engine.handle_turn(TurnRequest::new(&session, "any update")).await;
    assert!(matches!(second, Err(OrchestratorError::SessionBusy(_))));

    generator.release.notify_one();
    let first = first.await.unwrap().unwrap();
    assert_eq!(first.state, InterviewPhase::Delivered);
    assert_eq!(first.narrative_source, NarrativeSource::Generated);
    assert_eq!(first.turn.0, 1);
}

#[tokio::test]
async fn sessions_do_not_share_state() {
    let engine = engine();
    let a = engine.start_session("p-024").await;
    let b = engine.start_session("p-025").await;

    let (ra, rb) = tokio::join!(
        engine.handle_turn(TurnRequest::new(&a, DIABETIC_MAN)),
        engine.handle_turn(TurnRequest::new(&b, "patient with high blood pressure")),
    );
    let (ra, rb) = (ra.unwrap(), rb.unwrap());

    assert_eq!(ra.state, InterviewPhase::Delivered);
    assert_eq!(rb.state, InterviewPhase::Clarifying);
    assert!(!rb.soap.objective.contains("Age: 58"));
}

#[tokio::test]
async fn end_session_archives_the_transcript() {
    let engine = engine();
    let session = engine.start_session("p-026").await;
    engine.handle_turn(TurnRequest::new(&session, DIABETIC_MAN)).await.unwrap();
    assert_eq!(engine.session_count(), 1);

    let archived = engine.end_session(&session).unwrap();
    assert_eq!(archived.session_id, session);
    assert_eq!(archived.patient_id, "p-026");
    assert_eq!(archived.turn_count, 1);
    assert_eq!(archived.final_phase, InterviewPhase::Delivered);
    assert_eq!(archived.transcript.len(), 2);
    assert_eq!(archived.transcript[0].speaker, Speaker::Patient);
    assert_eq!(archived.transcript[1].speaker, Speaker::Engine);
    assert!(!archived.profile_history.is_empty());
    assert!(archived.soap.plan.contains("Review in 4 weeks"), "{}", archived.soap.plan);

    assert_eq!(engine.session_count(), 0);
    let err = engine
        .handle_turn(TurnRequest::new(&session, DIABETIC_MAN))
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::SessionNotFound(_)));
}

#[tokio::test]
async fn a_new_turn_recomputes_from_the_updated_profile() {
    let engine = engine();
    let session = engine.start_session("p-027").await;

    let first = engine.handle_turn(TurnRequest::new(&session, DIABETIC_MAN)).await.unwrap();
    assert!(first.plan.iter().any(|l| l.line_id() == "ah-ccb"));

    let second = engine
        .handle_turn(TurnRequest::new(&session, "repeat blood pressure 148/92"))
        .await
        .unwrap();
    assert_eq!(second.turn.0, 2);
    assert_eq!(second.state, InterviewPhase::Delivered);
    assert!(!second.plan.iter().any(|l| l.line_id() == "ah-ccb"));
    assert!(second.soap.objective.contains("Blood pressure: 148/92"));
}

#[tokio::test]
async fn a_dropped_turn_does_not_wedge_the_session() {
    let engine = engine_with_stalling_guidelines();
    let session = engine.start_session("p-028").await;

    let dropped = tokio::time::timeout(
        Duration::from_millis(50),
        engine.handle_turn(TurnRequest::new(&session, DIABETIC_MAN)),
    )
    .await;
    assert!(dropped.is_err());

    let response = engine.handle_turn(TurnRequest::new(&session, DIABETIC_MAN)).await.unwrap();
    assert_eq!(response.state, InterviewPhase::Delivered);
    assert_eq!(response.turn.0, 2);
    assert!(!response.plan.is_empty());

    let follow_up = engine.handle_turn(TurnRequest::new(&session, "any change?")).await.unwrap();
    assert_eq!(follow_up.state, InterviewPhase::Delivered);
}
