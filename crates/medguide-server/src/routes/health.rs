use axum::extract::State;
use axum::Json;
use medguide_orchestrator::TableVersions;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct Health {
    status: &'static str,
    sessions: usize,
    tables: TableVersions,
}

pub async fn health_check(State(state): State<AppState>) -> Json<Health> {
    Json(Health {
        status: "ok",
        sessions: state.engine.session_count(),
        tables: state.engine.rules().versions(),
    })
}
