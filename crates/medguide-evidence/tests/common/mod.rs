#![allow(dead_code)]

use std::sync::Arc;

use medguide_core::models::evidence::Grade;
use medguide_evidence::{
    DocumentSource, GuidelinePassage, InMemoryRecordStore, Record, StatRow, StatTable,
    TableSource,
};

pub fn ts(date: &str) -> jiff::Timestamp {
    format!("{date}T00:00:00Z").parse().unwrap()
}

pub fn codes(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

pub fn passages() -> Vec<GuidelinePassage> {
    vec![
        GuidelinePassage {
            document: "htn-guideline-2024".to_string(),
            page: 12,
            title: "Initial drug therapy".to_string(),
            body: "ACE inhibitors, ARBs, calcium channel blockers and thiazide diuretics are first-line agents for hypertension.".to_string(),
            grade: Grade::IA,
            published_at: Some(ts("2024-03-01")),
            terms: codes(&["cond:hypertension", "class:acei", "class:arb", "class:ccb_dhp"]),
        },
        GuidelinePassage {
            document: "htn-guideline-2024".to_string(),
            page: 30,
            title: "Hypertension with diabetes".to_string(),
            body: "In patients with diabetes, an ACE inhibitor or ARB is preferred when albuminuria is present.".to_string(),
            grade: Grade::IB,
            published_at: Some(ts("2024-03-01")),
            terms: codes(&["cond:hypertension", "cond:t2dm", "class:acei", "class:arb"]),
        },
        GuidelinePassage {
            document: "htn-guideline-2010".to_string(),
            page: 8,
            title: "Initial drug therapy".to_string(),
            body: "Thiazide diuretics remain first-line agents for uncomplicated hypertension.".to_string(),
            grade: Grade::IA,
            published_at: Some(ts("2010-06-01")),
            terms: codes(&["cond:hypertension", "class:thiazide"]),
        },
        GuidelinePassage {
            document: "dm-guideline-2023".to_string(),
            page: 5,
            title: "Glycaemic targets".to_string(),
            body: "An HbA1c target below 7.0% is recommended for most adults with type 2 diabetes.".to_string(),
            grade: Grade::IA,
            published_at: Some(ts("2023-01-15")),
            terms: codes(&["cond:t2dm", "lab:hba1c"]),
        },
    ]
}

pub fn tables() -> Vec<StatTable> {
    vec![StatTable {
        name: "bp_outcomes".to_string(),
        title: "Blood pressure outcomes by comorbidity".to_string(),
        grade: Grade::IIA,
        published_at: Some(ts("2022-09-01")),
        rows: vec![
            StatRow {
                row: 1,
                text: "hypertension: 12% 10-year stroke incidence".to_string(),
                terms: codes(&["cond:hypertension"]),
            },
            StatRow {
                row: 2,
                text: "hypertension with diabetes: 21% 10-year stroke incidence".to_string(),
                terms: codes(&["cond:hypertension", "cond:t2dm"]),
            },
            StatRow {
                row: 3,
                text: "asthma: no association".to_string(),
                terms: codes(&["cond:asthma"]),
            },
            StatRow {
                row: 4,
                text: "diabetes alone: 9% 10-year stroke incidence".to_string(),
                terms: codes(&["cond:t2dm"]),
            },
        ],
    }]
}

pub fn records() -> Vec<Record> {
    vec![
        Record {
            table: "case_outcomes".to_string(),
            key_column: "case_id".to_string(),
            key: "c-1001".to_string(),
            text: "58-year-old with hypertension and diabetes controlled on ACE inhibitor plus amlodipine.".to_string(),
            grade: Grade::IIB,
            terms: codes(&["cond:hypertension", "cond:t2dm", "class:acei"]),
            recorded_at: Some(ts("2024-05-10")),
        },
        Record {
            table: "case_outcomes".to_string(),
            key_column: "case_id".to_string(),
            key: "c-1002".to_string(),
            text: "Pregnant patient switched to labetalol after ACE inhibitor exposure.".to_string(),
            grade: Grade::IIB,
            terms: codes(&["cond:hypertension", "class:alpha_beta_blocker"]),
            recorded_at: Some(ts("2023-11-02")),
        },
    ]
}

pub fn document_source() -> DocumentSource {
    DocumentSource::in_memory("guidelines", &passages()).unwrap()
}

pub fn table_source() -> TableSource {
    TableSource::new("statistics", tables())
}

pub fn record_store() -> Arc<InMemoryRecordStore> {
    Arc::new(InMemoryRecordStore::new(records()))
}
