//! Session registry.
//!
//! Each session sits behind its own async mutex. A turn takes the lock with
//! `try_lock_owned`, so a second concurrent turn for the same session is
//! rejected instead of interleaving with the first. Sessions share nothing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use medguide_core::models::interview::{InterviewPhase, InterviewState, SoapNote, TranscriptEntry};
use medguide_core::models::profile::{FactUpdate, PatientProfile};
use serde::Serialize;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::info;

use crate::error::OrchestratorError;
use crate::render::soap_note;
use crate::response::Notice;

#[derive(Debug)]
pub struct Session {
    pub id: String,
    pub profile: PatientProfile,
    pub state: InterviewState,
    pub created_at: jiff::Timestamp,
    /// Reported with the next turn, then cleared.
    pub pending_notices: Vec<Notice>,
}

/// What is kept of a session after it ends.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArchivedSession {
    pub session_id: String,
    pub patient_id: String,
    pub started_at: jiff::Timestamp,
    pub ended_at: jiff::Timestamp,
    pub turn_count: u32,
    pub final_phase: InterviewPhase,
    pub soap: SoapNote,
    pub transcript: Vec<TranscriptEntry>,
    pub profile_history: Vec<FactUpdate>,
}

pub type SessionGuard = OwnedMutexGuard<Session>;

#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, Arc<AsyncMutex<Session>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a session over an already seeded profile.
    pub fn create(&self, profile: PatientProfile, pending_notices: Vec<Notice>, now: jiff::Timestamp) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        let known = profile.known_field_count();
        let session = Session {
            id: id.clone(),
            profile,
            state: InterviewState::new(),
            created_at: now,
            pending_notices,
        };
        self.lock()
            .insert(id.clone(), Arc::new(AsyncMutex::new(session)));
        info!(session_id = %id, known_fields = known, "session created");
        id
    }

    /// Exclusive access for one turn.
    pub fn acquire(&self, session_id: &str) -> Result<SessionGuard, OrchestratorError> {
        let session = self
            .lock()
            .get(session_id)
            .cloned()
            .ok_or_else(|| OrchestratorError::SessionNotFound(session_id.to_string()))?;
        session
            .try_lock_owned()
            .map_err(|_| OrchestratorError::SessionBusy(session_id.to_string()))
    }

    /// Ends a session. Fails with `SessionBusy` while a turn is in flight.
    pub fn remove(&self, session_id: &str, now: jiff::Timestamp) -> Result<ArchivedSession, OrchestratorError> {
        let guard = self.acquire(session_id)?;
        self.lock().remove(session_id);

        let archived = ArchivedSession {
            session_id: guard.id.clone(),
            patient_id: guard.profile.patient_id().to_string(),
            started_at: guard.created_at,
            ended_at: now,
            turn_count: guard.state.turn_count,
            final_phase: guard.state.phase(),
            soap: soap_note(&guard.state),
            transcript: guard.state.transcript.clone(),
            profile_history: guard.profile.history().to_vec(),
        };
        info!(session_id = %session_id, turns = archived.turn_count, "session archived");
        Ok(archived)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<AsyncMutex<Session>>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
