use medguide_core::BoxFuture;
use medguide_core::models::evidence::{EvidenceItem, Locator, SourceKind};

use crate::error::EvidenceError;
use crate::filters::EvidenceFilters;

/// One read-only backing store of evidence.
///
/// Implementations attach a locator that reproduces the exact origin of
/// each item and report failures as errors, never as empty results.
pub trait EvidenceSource: Send + Sync {
    /// Short name used in logs and in `SourceUnavailable`.
    fn name(&self) -> &str;

    fn kind(&self) -> SourceKind;

    /// Items about any of the canonical term codes.
    fn query<'a>(
        &'a self,
        terms: &'a [String],
        filters: &'a EvidenceFilters,
    ) -> BoxFuture<'a, Result<Vec<EvidenceItem>, EvidenceError>>;

    /// Re-fetch the item a locator points at. `Ok(None)` when the locator
    /// belongs to another source or no longer exists.
    fn resolve<'a>(
        &'a self,
        locator: &'a Locator,
    ) -> BoxFuture<'a, Result<Option<EvidenceItem>, EvidenceError>>;

    /// Dated items published at or after `since`, newest first.
    fn updated_since<'a>(
        &'a self,
        since: jiff::Timestamp,
    ) -> BoxFuture<'a, Result<Vec<EvidenceItem>, EvidenceError>>;
}
