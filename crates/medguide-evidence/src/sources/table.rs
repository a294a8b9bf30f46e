use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use medguide_core::BoxFuture;
use medguide_core::models::evidence::{EvidenceItem, Grade, Locator, SourceKind};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::EvidenceError;
use crate::filters::EvidenceFilters;
use crate::source::EvidenceSource;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatRow {
    pub row: u32,
    pub text: String,
    pub terms: Vec<String>,
}

/// A table of case statistics. Rows are kept sorted by row number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatTable {
    pub name: String,
    pub title: String,
    pub grade: Grade,
    #[serde(default)]
    pub published_at: Option<jiff::Timestamp>,
    pub rows: Vec<StatRow>,
}

impl StatTable {
    fn matches(row: &StatRow, terms: &[String]) -> bool {
        row.terms.iter().any(|t| terms.contains(t))
    }

    /// Runs of consecutive matching rows, each merged into one item.
    fn items_for(&self, terms: &[String]) -> Vec<EvidenceItem> {
        let mut items = Vec::new();
        let mut run: Vec<&StatRow> = Vec::new();

        for row in &self.rows {
            let contiguous = run.last().is_none_or(|last| row.row == last.row + 1);
            if Self::matches(row, terms) && contiguous {
                run.push(row);
                continue;
            }
            if !run.is_empty() {
                items.push(self.merge(&run));
                run.clear();
            }
            if Self::matches(row, terms) {
                run.push(row);
            }
        }
        if !run.is_empty() {
            items.push(self.merge(&run));
        }
        items
    }

    fn merge(&self, run: &[&StatRow]) -> EvidenceItem {
        let first_row = run.first().map(|r| r.row).unwrap_or_default();
        let last_row = run.last().map(|r| r.row).unwrap_or(first_row);
        let text = run.iter().map(|r| r.text.as_str()).collect::<Vec<_>>().join("; ");
        let terms: Vec<String> = run.iter().flat_map(|r| r.terms.iter().cloned()).collect();

        let mut item = EvidenceItem::new(
            text,
            Locator::Table {
                table: self.name.clone(),
                first_row,
                last_row,
            },
            self.grade,
        )
        .with_title(self.title.clone())
        .with_relevance(run.len() as f32)
        .with_terms(terms);
        if let Some(at) = self.published_at {
            item = item.with_recency(at);
        }
        item
    }

    fn row_range(&self, first_row: u32, last_row: u32) -> Option<EvidenceItem> {
        let run: Vec<&StatRow> = self
            .rows
            .iter()
            .filter(|r| (first_row..=last_row).contains(&r.row))
            .collect();
        let expected = last_row.checked_sub(first_row)? as usize + 1;
        (run.len() == expected).then(|| self.merge(&run))
    }
}

pub struct TableSource {
    name: String,
    tables: RwLock<Arc<Vec<StatTable>>>,
}

impl TableSource {
    pub fn new(name: impl Into<String>, tables: Vec<StatTable>) -> Self {
        Self {
            name: name.into(),
            tables: RwLock::new(Arc::new(sorted(tables))),
        }
    }

    pub fn load(name: impl Into<String>, path: &Path) -> Result<Self, EvidenceError> {
        let raw = std::fs::read_to_string(path)?;
        let tables: Vec<StatTable> = serde_json::from_str(&raw)?;
        let name = name.into();
        info!(source = %name, path = %path.display(), tables = tables.len(), "loaded statistics tables");
        Ok(Self::new(name, tables))
    }

    pub fn refresh(&self, tables: Vec<StatTable>) {
        let fresh = Arc::new(sorted(tables));
        *self.tables.write().unwrap_or_else(PoisonError::into_inner) = fresh;
    }

    fn snapshot(&self) -> Arc<Vec<StatTable>> {
        Arc::clone(&self.tables.read().unwrap_or_else(PoisonError::into_inner))
    }
}

fn sorted(mut tables: Vec<StatTable>) -> Vec<StatTable> {
    for table in &mut tables {
        table.rows.sort_by_key(|r| r.row);
    }
    tables
}

impl EvidenceSource for TableSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Table
    }

    fn query<'a>(
        &'a self,
        terms: &'a [String],
        filters: &'a EvidenceFilters,
    ) -> BoxFuture<'a, Result<Vec<EvidenceItem>, EvidenceError>> {
        Box::pin(async move {
            if terms.is_empty() || !filters.allows_kind(SourceKind::Table) {
                return Ok(Vec::new());
            }
            let tables = self.snapshot();
            let items: Vec<EvidenceItem> = tables.iter().flat_map(|t| t.items_for(terms)).collect();
            debug!(source = %self.name, hits = items.len(), "statistics query");
            Ok(filters.apply(items))
        })
    }

    fn resolve<'a>(
        &'a self,
        locator: &'a Locator,
    ) -> BoxFuture<'a, Result<Option<EvidenceItem>, EvidenceError>> {
        Box::pin(async move {
            let Locator::Table {
                table,
                first_row,
                last_row,
            } = locator
            else {
                return Ok(None);
            };
            let tables = self.snapshot();
            Ok(tables
                .iter()
                .find(|t| &t.name == table)
                .and_then(|t| t.row_range(*first_row, *last_row)))
        })
    }

    fn updated_since<'a>(
        &'a self,
        since: jiff::Timestamp,
    ) -> BoxFuture<'a, Result<Vec<EvidenceItem>, EvidenceError>> {
        Box::pin(async move {
            let tables = self.snapshot();
            let mut items: Vec<EvidenceItem> = tables
                .iter()
                .filter(|t| t.published_at.is_some_and(|at| at >= since))
                .filter_map(|t| {
                    let all: Vec<&StatRow> = t.rows.iter().collect();
                    (!all.is_empty()).then(|| t.merge(&all))
                })
                .collect();
            items.sort_by(|a, b| b.recency_timestamp().cmp(&a.recency_timestamp()));
            Ok(items)
        })
    }
}
