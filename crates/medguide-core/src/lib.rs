//! medguide-core
//!
//! Pure domain types shared by every engine component: the patient profile,
//! evidence items and their locators, risk and safety results, plan lines,
//! the interview state, and the declarative `Condition` predicates that rule
//! tables are written in. No I/O and no async runtime dependency.

pub mod condition;
pub mod error;
pub mod future;
pub mod generation;
pub mod models;

pub use crate::condition::{Condition, ConditionContext};
pub use crate::error::CoreError;
pub use crate::future::BoxFuture;
