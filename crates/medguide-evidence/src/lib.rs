//! medguide-evidence
//!
//! Read-only evidence retrieval over guideline passages (tantivy), tabular
//! statistics and relational records, plus fusion of the candidates into a
//! ranked, deduplicated bundle.

pub mod chart;
pub mod error;
pub mod filters;
pub mod fusion;
pub mod schema;
pub mod source;
pub mod sources;
pub mod store;

pub use crate::chart::{ChartDiagnosis, ChartLab, ChartMedication, ChartVitals, PatientChart};
pub use crate::error::EvidenceError;
pub use crate::filters::EvidenceFilters;
pub use crate::fusion::{fuse, FusionConfig, QueryContext};
pub use crate::source::EvidenceSource;
pub use crate::sources::document::{DocumentSource, GuidelinePassage};
pub use crate::sources::relational::{InMemoryRecordStore, Record, RecordStore, RelationalSource};
pub use crate::sources::table::{StatRow, StatTable, TableSource};
pub use crate::store::EvidenceStore;
