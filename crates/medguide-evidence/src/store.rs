use std::sync::Arc;

use futures::future::join_all;
use medguide_core::models::evidence::{EvidenceItem, Locator};
use tracing::{info, warn};

use crate::error::EvidenceError;
use crate::filters::EvidenceFilters;
use crate::source::EvidenceSource;

/// Every configured source behind one query interface.
///
/// Sources are queried concurrently. If any of them fails the whole call
/// fails with `SourceUnavailable` naming each failing source, so an empty
/// result always means nothing matched.
pub struct EvidenceStore {
    sources: Vec<Arc<dyn EvidenceSource>>,
    staleness: jiff::SignedDuration,
}

impl EvidenceStore {
    pub fn new(staleness_days: u32) -> Self {
        Self {
            sources: Vec::new(),
            staleness: jiff::SignedDuration::from_hours(i64::from(staleness_days) * 24),
        }
    }

    pub fn with_source(mut self, source: Arc<dyn EvidenceSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// Items older than the staleness threshold at `now` come back flagged
    /// `superseded_candidate`, never dropped.
    pub async fn query(
        &self,
        terms: &[String],
        filters: &EvidenceFilters,
        now: jiff::Timestamp,
    ) -> Result<Vec<EvidenceItem>, EvidenceError> {
        let selected: Vec<&Arc<dyn EvidenceSource>> = self
            .sources
            .iter()
            .filter(|s| filters.allows_kind(s.kind()))
            .collect();

        let results = join_all(selected.iter().map(|s| s.query(terms, filters))).await;

        let cutoff = now.checked_sub(self.staleness).ok();
        let mut items = Vec::new();
        let mut failures = Vec::new();
        for (source, result) in selected.iter().zip(results) {
            match result {
                Ok(found) => items.extend(found.into_iter().map(|item| flag_stale(item, cutoff))),
                Err(e) => {
                    warn!(source = source.name(), error = %e, "evidence source failed");
                    failures.push((source.name().to_string(), e.to_string()));
                }
            }
        }

        if !failures.is_empty() {
            return Err(unavailable(failures));
        }

        info!(
            sources = selected.len(),
            terms = terms.len(),
            items = items.len(),
            "evidence retrieved"
        );
        Ok(items)
    }

    /// Re-fetch the item behind a locator from the source that owns it.
    pub async fn resolve(&self, locator: &Locator) -> Result<Option<EvidenceItem>, EvidenceError> {
        let kind = locator.source_kind();
        for source in self.sources.iter().filter(|s| s.kind() == kind) {
            match source.resolve(locator).await {
                Ok(Some(item)) => return Ok(Some(item)),
                Ok(None) => continue,
                Err(e) => return Err(unavailable(vec![(source.name().to_string(), e.to_string())])),
            }
        }
        Ok(None)
    }

    /// Guideline timeliness listing: everything published at or after
    /// `since`, newest first.
    pub async fn updated_since(&self, since: jiff::Timestamp) -> Result<Vec<EvidenceItem>, EvidenceError> {
        let results = join_all(self.sources.iter().map(|s| s.updated_since(since))).await;

        let mut items = Vec::new();
        let mut failures = Vec::new();
        for (source, result) in self.sources.iter().zip(results) {
            match result {
                Ok(found) => items.extend(found),
                Err(e) => failures.push((source.name().to_string(), e.to_string())),
            }
        }
        if !failures.is_empty() {
            return Err(unavailable(failures));
        }
        items.sort_by(|a, b| b.recency_timestamp().cmp(&a.recency_timestamp()));
        Ok(items)
    }
}

fn flag_stale(item: EvidenceItem, cutoff: Option<jiff::Timestamp>) -> EvidenceItem {
    match (cutoff, item.recency_timestamp()) {
        (Some(cutoff), Some(at)) if at < cutoff => item.flag_superseded(),
        _ => item,
    }
}

fn unavailable(failures: Vec<(String, String)>) -> EvidenceError {
    let (names, reasons): (Vec<String>, Vec<String>) = failures.into_iter().unzip();
    EvidenceError::SourceUnavailable {
        sources: names.join(", "),
        reason: reasons.join("; "),
    }
}
