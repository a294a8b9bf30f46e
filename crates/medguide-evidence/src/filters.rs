use medguide_core::models::evidence::{EvidenceItem, SourceKind};
use serde::{Deserialize, Serialize};

/// Optional narrowing of a query. An empty `source_kinds` means every kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvidenceFilters {
    #[serde(default)]
    pub published_after: Option<jiff::Timestamp>,
    #[serde(default)]
    pub published_before: Option<jiff::Timestamp>,
    #[serde(default)]
    pub source_kinds: Vec<SourceKind>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl EvidenceFilters {
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn only(mut self, kinds: impl IntoIterator<Item = SourceKind>) -> Self {
        self.source_kinds = kinds.into_iter().collect();
        self
    }

    pub fn allows_kind(&self, kind: SourceKind) -> bool {
        self.source_kinds.is_empty() || self.source_kinds.contains(&kind)
    }

    /// Undated items pass the date bounds; nothing is known against them.
    pub fn allows_date(&self, at: Option<jiff::Timestamp>) -> bool {
        let Some(at) = at else {
            return true;
        };
        self.published_after.is_none_or(|after| at >= after)
            && self.published_before.is_none_or(|before| at <= before)
    }

    pub fn allows(&self, item: &EvidenceItem) -> bool {
        self.allows_kind(item.source_kind()) && self.allows_date(item.recency_timestamp())
    }

    pub fn apply(&self, mut items: Vec<EvidenceItem>) -> Vec<EvidenceItem> {
        items.retain(|item| self.allows(item));
        if let Some(limit) = self.limit {
            items.truncate(limit);
        }
        items
    }
}
