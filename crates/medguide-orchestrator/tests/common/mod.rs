#![allow(dead_code)]

use std::sync::Arc;

use medguide_core::models::evidence::Grade;
use medguide_evidence::{
    DocumentSource, EvidenceStore, GuidelinePassage, InMemoryRecordStore, Record, RelationalSource, StatRow,
    StatTable, TableSource,
};
use medguide_orchestrator::{Engine, EngineConfig, RuleSet};

pub fn ts(date: &str) -> jiff::Timestamp {
    format!("{date}T00:00:00Z").parse().unwrap()
}

pub fn codes(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn passage(document: &str, page: u32, title: &str, body: &str, grade: Grade, terms: &[&str]) -> GuidelinePassage {
    GuidelinePassage {
        document: document.to_string(),
        page,
        title: title.to_string(),
        body: body.to_string(),
        grade,
        published_at: Some(ts("2024-03-01")),
        terms: codes(terms),
    }
}

pub fn passages() -> Vec<GuidelinePassage> {
    vec![
        passage(
            "htn-guideline-2024",
            4,
            "Diagnosis",
            "Hypertension is diagnosed when repeated office readings are at or above 140/90 mmHg.",
            Grade::IA,
            &["cond:hypertension"],
        ),
        passage(
            "htn-guideline-2024",
            12,
            "Initial drug therapy",
            "ACE inhibitors and dihydropyridine calcium channel blockers are first-line agents.",
            Grade::IA,
            &["class:acei", "class:ccb_dhp"],
        ),
        passage(
            "htn-guideline-2024",
            14,
            "Diuretics",
            "Thiazide-like diuretics may be added when two agents do not reach target.",
            Grade::IB,
            &["class:thiazide"],
        ),
        passage(
            "htn-guideline-2024",
            22,
            "Lifestyle",
            "Sodium restriction and regular aerobic exercise lower blood pressure by several mmHg.",
            Grade::IA,
            &["cond:hypertension"],
        ),
        passage(
            "htn-guideline-2024",
            40,
            "Hypertensive emergency",
            "Severe hypertension with acute organ damage requires admission and controlled reduction.",
            Grade::IA,
            &["cond:hypertensive_emergency"],
        ),
        passage(
            "htn-guideline-2024",
            42,
            "Acute neurological presentation",
            "Headache with vomiting at very high pressure warrants imaging to exclude stroke.",
            Grade::IB,
            &["cond:stroke"],
        ),
        passage(
            "htn-guideline-2024",
            50,
            "Secondary causes",
            "Screen for secondary causes in severe or resistant hypertension and in young adults.",
            Grade::IIA,
            &["cond:secondary_hypertension"],
        ),
        passage(
            "obstetric-guideline-2023",
            7,
            "Hypertension in pregnancy",
            "Gestational hypertension arises after twenty weeks without proteinuria.",
            Grade::IA,
            &["cond:gestational_hypertension"],
        ),
        passage(
            "obstetric-guideline-2023",
            9,
            "Pre-eclampsia",
            "Pre-eclampsia adds proteinuria or organ dysfunction to raised pressure in pregnancy.",
            Grade::IA,
            &["cond:preeclampsia"],
        ),
        passage(
            "obstetric-guideline-2023",
            15,
            "Drug treatment in pregnancy",
            "Labetalol, nifedipine and methyldopa are suitable in pregnancy; avoid RAAS blockade.",
            Grade::IA,
            &["class:alpha_beta_blocker", "class:central_alpha_agonist"],
        ),
        passage(
            "dm-guideline-2023",
            5,
            "Glycaemic control",
            "Metformin is the preferred first agent for most adults with type 2 diabetes.",
            Grade::IA,
            &["cond:t2dm", "class:biguanide"],
        ),
        passage(
            "dm-guideline-2023",
            11,
            "Insulin",
            "Basal insulin is started when oral agents fail to reach the HbA1c target.",
            Grade::IB,
            &["class:insulin"],
        ),
        passage(
            "dm-guideline-2023",
            18,
            "Kidney protection",
            "Check eGFR and urine albumin yearly in diabetes to detect nephropathy early.",
            Grade::IA,
            &["cond:ckd", "cond:diabetic_nephropathy"],
        ),
        passage(
            "lipid-guideline-2022",
            3,
            "Statin therapy",
            "Moderate-intensity statin therapy is advised for adults over forty with diabetes.",
            Grade::IA,
            &["class:statin"],
        ),
        passage(
            "prevention-guideline-2022",
            8,
            "Weight and smoking",
            "Weight reduction of five percent and smoking cessation reduce cardiovascular events.",
            Grade::IB,
            &["cond:obesity", "finding:smoking"],
        ),
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
                terms: codes(&["cond:hypertension", "cond:stroke"]),
            },
            StatRow {
                row: 2,
                text: "hypertension with diabetes: 21% 10-year stroke incidence".to_string(),
                terms: codes(&["cond:hypertension", "cond:t2dm"]),
            },
        ],
    }]
}

pub fn records() -> Vec<Record> {
    vec![Record {
        table: "case_outcomes".to_string(),
        key_column: "case_id".to_string(),
        key: "c-1001".to_string(),
        text: "58-year-old with hypertension and diabetes controlled on ACE inhibitor plus amlodipine.".to_string(),
        grade: Grade::IIB,
        terms: codes(&["cond:hypertension", "cond:t2dm", "class:acei"]),
        recorded_at: Some(ts("2024-05-10")),
    }]
}

pub fn record_store() -> Arc<InMemoryRecordStore> {
    Arc::new(InMemoryRecordStore::new(records()))
}

pub fn evidence_store(records: Arc<InMemoryRecordStore>) -> EvidenceStore {
    EvidenceStore::new(1825)
        .with_source(Arc::new(DocumentSource::in_memory("guidelines", &passages()).unwrap()))
        .with_source(Arc::new(TableSource::new("statistics", tables())))
        .with_source(Arc::new(RelationalSource::new("records", records)))
}

pub fn test_config() -> EngineConfig {
    EngineConfig {
        evidence_limit: 40,
        ..EngineConfig::default()
    }
}

pub fn engine_with_config(config: EngineConfig, records: Arc<InMemoryRecordStore>) -> Engine {
    Engine::new(config, RuleSet::bundled().unwrap(), evidence_store(records))
        .unwrap()
        .with_clock(Arc::new(|| ts("2025-01-01")))
}

pub fn engine_with(records: Arc<InMemoryRecordStore>) -> Engine {
    engine_with_config(test_config(), records)
}

pub fn engine() -> Engine {
    engine_with(record_store())
}
