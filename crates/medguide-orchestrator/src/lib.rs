//! medguide-orchestrator
//!
//! The diagnosis interview engine. Each session moves through
//! `Intake -> Clarifying -> Assessing -> Drafting -> SafetyGating ->
//! Delivered`, or ends a cycle in `Insufficient` or `Error`. Risk,
//! safety and evidence retrieval run concurrently inside a turn; the
//! differential and plan are synthesized deterministically from versioned
//! catalogs and cited evidence, then gated by the safety rules. Text
//! generation only rephrases the finished result.

pub mod catalog;
pub mod clarify;
pub mod config;
pub mod engine;
pub mod error;
pub mod gating;
pub mod intake;
pub mod render;
pub mod response;
pub mod rules;
pub mod session;
pub mod synthesis;

pub use crate::config::{EngineConfig, RuleTablePaths};
pub use crate::engine::{Clock, Engine};
pub use crate::error::OrchestratorError;
pub use crate::response::{
    NarrativeSource, Notice, NoticeKind, PatientReview, Question, StructuredFields, SymptomInput, TurnRequest,
    TurnResponse,
};
pub use crate::rules::{RuleSet, TableVersions};
pub use crate::session::ArchivedSession;
