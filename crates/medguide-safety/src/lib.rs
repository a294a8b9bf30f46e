//! medguide-safety
//!
//! Rule-based safety policy. Contraindication, interaction and emergency
//! rules are versioned data evaluated by one generic loop: every rule is
//! checked independently and every match becomes a directive. No generative
//! component takes part in any decision made here.

pub mod error;
pub mod gate;
pub mod guard;
pub mod report;
pub mod rules;

pub use crate::error::SafetyError;
pub use crate::gate::{detect_conflicts, gate_plan, GateOutcome, RuleConflict, SubstitutionRequest};
pub use crate::guard::SafetyGuard;
pub use crate::report::render_report;
pub use crate::rules::{RuleScope, SafetyRule, SafetyRuleTable};
