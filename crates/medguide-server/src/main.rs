use std::env;
use std::path::Path;
use std::sync::Arc;

use medguide_bedrock::BedrockGenerator;
use medguide_evidence::{DocumentSource, EvidenceStore, InMemoryRecordStore, RelationalSource, TableSource};
use medguide_orchestrator::{Engine, EngineConfig, RuleSet};
use medguide_server::AppState;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .json()
        .init();

    let config = match env::var("MEDGUIDE_CONFIG") {
        Ok(path) => EngineConfig::load(Path::new(&path))?,
        Err(_) => {
            tracing::info!("MEDGUIDE_CONFIG not set, using default engine config");
            EngineConfig::default()
        }
    };
    let rules = RuleSet::load(&config.tables)?;

    let mut evidence = EvidenceStore::new(config.staleness_days);
    if let Ok(dir) = env::var("MEDGUIDE_INDEX_DIR") {
        let source = DocumentSource::open_in_dir("guidelines", Path::new(&dir))?;
        evidence = evidence.with_source(Arc::new(source));
    }
    if let Ok(path) = env::var("MEDGUIDE_TABLES") {
        let source = TableSource::load("statistics", Path::new(&path))?;
        evidence = evidence.with_source(Arc::new(source));
    }
    let mut patients = None;
    if let Ok(path) = env::var("MEDGUIDE_RECORDS") {
        let store = Arc::new(InMemoryRecordStore::load(Path::new(&path))?);
        evidence = evidence.with_source(Arc::new(RelationalSource::new("records", store.clone())));
        patients = Some(store);
    }
    if evidence.source_names().is_empty() {
        tracing::warn!("no evidence sources configured; every assessment will end as insufficient");
    }

    let mut engine = Engine::new(config, rules, evidence)?;
    if let Some(store) = patients {
        engine = engine.with_patient_records(store);
    }
    if let Ok(model_id) = env::var("MEDGUIDE_MODEL_ID") {
        let region = env::var("AWS_REGION").ok();
        let generator = BedrockGenerator::from_env(region.as_deref(), model_id).await;
        engine = engine.with_generator(Arc::new(generator));
    }

    let app = medguide_server::router(AppState::new(engine));

    let bind = env::var("MEDGUIDE_BIND").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    tracing::info!(bind = %bind, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}
