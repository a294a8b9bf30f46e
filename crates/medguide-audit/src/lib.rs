//! medguide-audit
//!
//! Structured audit events for provenance-relevant engine actions.

pub mod events;

pub use crate::events::AuditEvent;
