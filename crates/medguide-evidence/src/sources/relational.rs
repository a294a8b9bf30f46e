use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use medguide_core::BoxFuture;
use medguide_core::models::evidence::{EvidenceItem, Grade, Locator, SourceKind};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::chart::PatientChart;
use crate::error::EvidenceError;
use crate::filters::EvidenceFilters;
use crate::source::EvidenceSource;

/// A clinical record row, already projected to what evidence needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub table: String,
    pub key_column: String,
    pub key: String,
    pub text: String,
    #[serde(default = "ungraded")]
    pub grade: Grade,
    pub terms: Vec<String>,
    #[serde(default)]
    pub recorded_at: Option<jiff::Timestamp>,
}

fn ungraded() -> Grade {
    Grade::Ungraded
}

impl Record {
    fn locator(&self) -> Locator {
        Locator::Relational {
            table: self.table.clone(),
            key_column: self.key_column.clone(),
            key: self.key.clone(),
        }
    }

    fn to_item(&self) -> EvidenceItem {
        let mut item = EvidenceItem::new(self.text.clone(), self.locator(), self.grade)
            .with_title(format!("{} {}", self.table, self.key))
            .with_terms(self.terms.iter().cloned());
        if let Some(at) = self.recorded_at {
            item = item.with_recency(at);
        }
        item
    }
}

/// Read access to a relational store. Implementations own their
/// connection handling; errors surface as `EvidenceError::RecordStore`.
pub trait RecordStore: Send + Sync {
    fn find_by_terms<'a>(&'a self, terms: &'a [String]) -> BoxFuture<'a, Result<Vec<Record>, EvidenceError>>;

    fn get<'a>(
        &'a self,
        table: &'a str,
        key_column: &'a str,
        key: &'a str,
    ) -> BoxFuture<'a, Result<Option<Record>, EvidenceError>>;

    fn recorded_since<'a>(&'a self, since: jiff::Timestamp) -> BoxFuture<'a, Result<Vec<Record>, EvidenceError>>;

    /// The chart of one patient. `Ok(None)` when the patient is unknown.
    fn patient_chart<'a>(&'a self, patient_id: &'a str) -> BoxFuture<'a, Result<Option<PatientChart>, EvidenceError>>;
}

/// On-disk form: a bare array of records, or records plus charts.
#[derive(Deserialize)]
#[serde(untagged)]
enum RecordFile {
    Records(Vec<Record>),
    Full {
        records: Vec<Record>,
        #[serde(default)]
        charts: Vec<PatientChart>,
    },
}

/// Records held in memory. `set_offline(true)` makes every call fail the
/// way an unreachable database would.
#[derive(Default)]
pub struct InMemoryRecordStore {
    records: RwLock<Arc<Vec<Record>>>,
    charts: RwLock<Arc<Vec<PatientChart>>>,
    offline: AtomicBool,
}

impl InMemoryRecordStore {
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records: RwLock::new(Arc::new(records)),
            charts: RwLock::new(Arc::new(Vec::new())),
            offline: AtomicBool::new(false),
        }
    }

    pub fn with_charts(self, charts: Vec<PatientChart>) -> Self {
        *self.charts.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(charts);
        self
    }

    pub fn from_json(raw: &str) -> Result<Self, EvidenceError> {
        Ok(match serde_json::from_str(raw)? {
            RecordFile::Records(records) => Self::new(records),
            RecordFile::Full { records, charts } => Self::new(records).with_charts(charts),
        })
    }

    pub fn load(path: &Path) -> Result<Self, EvidenceError> {
        let raw = std::fs::read_to_string(path)?;
        let store = Self::from_json(&raw)?;
        info!(
            path = %path.display(),
            records = store.snapshot().len(),
            charts = store.charts.read().unwrap_or_else(PoisonError::into_inner).len(),
            "loaded clinical records"
        );
        Ok(store)
    }

    pub fn replace(&self, records: Vec<Record>) {
        *self.records.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(records);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn snapshot(&self) -> Arc<Vec<Record>> {
        Arc::clone(&self.records.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn check_online(&self) -> Result<(), EvidenceError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(EvidenceError::RecordStore("connection refused".to_string()));
        }
        Ok(())
    }
}

impl RecordStore for InMemoryRecordStore {
    fn find_by_terms<'a>(&'a self, terms: &'a [String]) -> BoxFuture<'a, Result<Vec<Record>, EvidenceError>> {
        Box::pin(async move {
            self.check_online()?;
            Ok(self
                .snapshot()
                .iter()
                .filter(|r| r.terms.iter().any(|t| terms.contains(t)))
                .cloned()
                .collect())
        })
    }

    fn get<'a>(
        &'a self,
        table: &'a str,
        key_column: &'a str,
        key: &'a str,
    ) -> BoxFuture<'a, Result<Option<Record>, EvidenceError>> {
        Box::pin(async move {
            self.check_online()?;
            Ok(self
                .snapshot()
                .iter()
                .find(|r| r.table == table && r.key_column == key_column && r.key == key)
                .cloned())
        })
    }

    fn recorded_since<'a>(&'a self, since: jiff::Timestamp) -> BoxFuture<'a, Result<Vec<Record>, EvidenceError>> {
        Box::pin(async move {
            self.check_online()?;
            Ok(self
                .snapshot()
                .iter()
                .filter(|r| r.recorded_at.is_some_and(|at| at >= since))
                .cloned()
                .collect())
        })
    }

    fn patient_chart<'a>(&'a self, patient_id: &'a str) -> BoxFuture<'a, Result<Option<PatientChart>, EvidenceError>> {
        Box::pin(async move {
            self.check_online()?;
            let charts = Arc::clone(&self.charts.read().unwrap_or_else(PoisonError::into_inner));
            Ok(charts.iter().find(|c| c.patient_id == patient_id).cloned())
        })
    }
}

pub struct RelationalSource {
    name: String,
    store: Arc<dyn RecordStore>,
}

impl RelationalSource {
    pub fn new(name: impl Into<String>, store: Arc<dyn RecordStore>) -> Self {
        Self {
            name: name.into(),
            store,
        }
    }
}

impl EvidenceSource for RelationalSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Relational
    }

    fn query<'a>(
        &'a self,
        terms: &'a [String],
        filters: &'a EvidenceFilters,
    ) -> BoxFuture<'a, Result<Vec<EvidenceItem>, EvidenceError>> {
        Box::pin(async move {
            if terms.is_empty() || !filters.allows_kind(SourceKind::Relational) {
                return Ok(Vec::new());
            }
            let records = self.store.find_by_terms(terms).await?;
            debug!(source = %self.name, hits = records.len(), "record query");
            let items = records
                .iter()
                .map(|r| {
                    let overlap = r.terms.iter().filter(|t| terms.contains(t)).count();
                    r.to_item().with_relevance(overlap as f32)
                })
                .collect();
            Ok(filters.apply(items))
        })
    }

    fn resolve<'a>(
        &'a self,
        locator: &'a Locator,
    ) -> BoxFuture<'a, Result<Option<EvidenceItem>, EvidenceError>> {
        Box::pin(async move {
            let Locator::Relational {
                table,
                key_column,
                key,
            } = locator
            else {
                return Ok(None);
            };
            let record = self.store.get(table, key_column, key).await?;
            Ok(record.map(|r| r.to_item()))
        })
    }

    fn updated_since<'a>(
        &'a self,
        since: jiff::Timestamp,
    ) -> BoxFuture<'a, Result<Vec<EvidenceItem>, EvidenceError>> {
        Box::pin(async move {
            let mut items: Vec<EvidenceItem> = self
                .store
                .recorded_since(since)
                .await?
                .iter()
                .map(Record::to_item)
                .collect();
            items.sort_by(|a, b| b.recency_timestamp().cmp(&a.recency_timestamp()));
            Ok(items)
        })
    }
}
