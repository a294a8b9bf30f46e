//! medguide-risk
//!
//! Deterministic risk stratification. `assess` is a total, pure function of
//! a patient profile and a versioned risk table: blood-pressure stage,
//! glycaemic control, weighted risk factors, cardiovascular risk level,
//! follow-up plan and the headline risk tier.

pub mod engine;
pub mod error;
pub mod table;

pub use crate::engine::assess;
pub use crate::error::RiskError;
pub use crate::table::RiskTable;
