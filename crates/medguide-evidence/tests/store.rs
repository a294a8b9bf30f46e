mod common;

use std::sync::Arc;

use common::{codes, document_source, record_store, table_source, ts};
use medguide_core::models::evidence::{Locator, SourceKind};
use medguide_evidence::{EvidenceError, EvidenceFilters, EvidenceStore, RelationalSource};

fn store_with(records: Arc<medguide_evidence::InMemoryRecordStore>) -> EvidenceStore {
    EvidenceStore::new(1825)
        .with_source(Arc::new(document_source()))
        .with_source(Arc::new(table_source()))
        .with_source(Arc::new(RelationalSource::new("records", records)))
}

#[tokio::test]
async fn query_spans_every_source_kind() {
    let store = store_with(record_store());
    let items = store
        .query(&codes(&["cond:hypertension"]), &EvidenceFilters::default(), ts("2025-01-01"))
        .await
        .unwrap();

    let kinds: Vec<SourceKind> = items.iter().map(|i| i.source_kind()).collect();
    assert!(kinds.contains(&SourceKind::Document));
    assert!(kinds.contains(&SourceKind::Table));
    assert!(kinds.contains(&SourceKind::Relational));
}

#[tokio::test]
async fn old_guidelines_are_flagged_not_dropped() {
    let store = store_with(record_store());
    let items = store
        .query(&codes(&["class:thiazide"]), &EvidenceFilters::default(), ts("2025-01-01"))
        .await
        .unwrap();

    assert_eq!(items.len(), 1);
    assert!(items[0].superseded_candidate());

    let recent = store
        .query(&codes(&["lab:hba1c"]), &EvidenceFilters::default(), ts("2025-01-01"))
        .await
        .unwrap();
    assert!(!recent[0].superseded_candidate());
}

#[tokio::test]
async fn outage_names_the_failing_source() {
    let records = record_store();
    let store = store_with(records.clone());
    records.set_offline(true);

    let err = store
        .query(&codes(&["cond:hypertension"]), &EvidenceFilters::default(), ts("2025-01-01"))
        .await
        .unwrap_err();
    match err {
        EvidenceError::SourceUnavailable { sources, .. } => assert_eq!(sources, "records"),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn kind_filter_avoids_an_offline_source() {
    let records = record_store();
    let store = store_with(records.clone());
    records.set_offline(true);

    let filters = EvidenceFilters::default().only([SourceKind::Document, SourceKind::Table]);
    let items = store
        .query(&codes(&["cond:hypertension"]), &filters, ts("2025-01-01"))
        .await
        .unwrap();
    assert!(!items.is_empty());
}

#[tokio::test]
async fn resolve_routes_by_locator_kind() {
    let store = store_with(record_store());
    for uri in [
        "doc://htn-guideline-2024#page=12",
        "table://bp_outcomes#rows=1-2",
        "rel://case_outcomes/case_id=c-1002",
    ] {
        let locator: Locator = uri.parse().unwrap();
        let item = store.resolve(&locator).await.unwrap().unwrap();
        assert_eq!(item.locator().to_string(), uri);
    }

    let unknown: Locator = "doc://missing#page=1".parse().unwrap();
    assert!(store.resolve(&unknown).await.unwrap().is_none());
}

#[tokio::test]
async fn timeliness_lists_newest_first() {
    let store = store_with(record_store());
    let items = store.updated_since(ts("2023-06-01")).await.unwrap();

    assert!(!items.is_empty());
    assert!(items
        .iter()
        .all(|i| i.recency_timestamp().is_some_and(|at| at >= ts("2023-06-01"))));
    let dates: Vec<_> = items.iter().map(|i| i.recency_timestamp()).collect();
    let mut sorted = dates.clone();
    sorted.sort_by(|a, b| b.cmp(a));
    assert_eq!(dates, sorted);
    assert_eq!(items[0].locator().to_string(), "rel://case_outcomes/case_id=c-1001");
}
