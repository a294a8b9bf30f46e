//! SOAP-structured interview state and the phase graph of the turn cycle.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use super::profile::{FieldId, TurnId};
use super::term::AmbiguityGroup;
use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterviewPhase {
    #[default]
    Intake,
    Clarifying,
    Assessing,
    Drafting,
    SafetyGating,
    Delivered,
    Insufficient,
    Error,
}

impl InterviewPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            InterviewPhase::Intake => "intake",
            InterviewPhase::Clarifying => "clarifying",
            InterviewPhase::Assessing => "assessing",
            InterviewPhase::Drafting => "drafting",
            InterviewPhase::SafetyGating => "safety_gating",
            InterviewPhase::Delivered => "delivered",
            InterviewPhase::Insufficient => "insufficient",
            InterviewPhase::Error => "error",
        }
    }

    /// Terminal for the current turn cycle. A later utterance starts a new
    /// cycle at `Intake`.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            InterviewPhase::Delivered | InterviewPhase::Insufficient | InterviewPhase::Error
        )
    }

    /// A pass left in `Assessing`, `Drafting` or `SafetyGating` was dropped
    /// before it finished; the next turn restarts it at `Intake`.
    pub fn is_interrupted(self) -> bool {
        matches!(
            self,
            InterviewPhase::Assessing | InterviewPhase::Drafting | InterviewPhase::SafetyGating
        )
    }

    pub fn can_transition_to(self, next: InterviewPhase) -> bool {
        use InterviewPhase::*;
        match (self, next) {
            (Intake, Clarifying | Assessing) => true,
            (Clarifying, Intake) => true,
            (Assessing | Drafting | SafetyGating, Intake) => true,
            (Assessing, Drafting | Insufficient | Error) => true,
            (Drafting, SafetyGating | Insufficient | Error) => true,
            (SafetyGating, Delivered | Error) => true,
            (Delivered | Insufficient | Error, Intake) => true,
            _ => false,
        }
    }
}

impl fmt::Display for InterviewPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    Patient,
    Engine,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub turn: TurnId,
    pub speaker: Speaker,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InterviewState {
    phase: InterviewPhase,
    pub subjective: Vec<String>,
    pub objective: Vec<String>,
    pub assessment: Vec<String>,
    pub plan: Vec<String>,
    pub missing_fields: BTreeSet<FieldId>,
    pub turn_count: u32,
    /// How many times each clarification key has been asked.
    pub clarifications_asked: BTreeMap<String, u32>,
    pub pending_ambiguities: Vec<AmbiguityGroup>,
    pub transcript: Vec<TranscriptEntry>,
}

impl InterviewState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> InterviewPhase {
        self.phase
    }

    /// Moves to `next`, rejecting edges that are not part of the turn cycle.
    pub fn transition(&mut self, next: InterviewPhase) -> Result<(), CoreError> {
        if !self.phase.can_transition_to(next) {
            return Err(CoreError::InvalidTransition {
                from: self.phase.as_str(),
                to: next.as_str(),
            });
        }
        self.phase = next;
        Ok(())
    }

    pub fn begin_turn(&mut self) -> TurnId {
        self.turn_count += 1;
        TurnId(self.turn_count)
    }

    pub fn record(&mut self, turn: TurnId, speaker: Speaker, text: impl Into<String>) {
        self.transcript.push(TranscriptEntry {
            turn,
            speaker,
            text: text.into(),
        });
    }

    /// The last `window` transcript entries, oldest first.
    pub fn recent_transcript(&self, window: usize) -> &[TranscriptEntry] {
        let start = self.transcript.len().saturating_sub(window);
        &self.transcript[start..]
    }

    pub fn times_asked(&self, key: &str) -> u32 {
        self.clarifications_asked.get(key).copied().unwrap_or(0)
    }

    pub fn mark_asked(&mut self, key: &str) {
        *self.clarifications_asked.entry(key.to_string()).or_insert(0) += 1;
    }
}

/// Rendered SOAP note for the current cycle.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SoapNote {
    pub subjective: String,
    pub objective: String,
    pub assessment: String,
    pub plan: String,
}
