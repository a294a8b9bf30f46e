use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use medguide_orchestrator::{ArchivedSession, StructuredFields, TurnRequest, TurnResponse};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateSession {
    pub patient_id: String,
}

#[derive(Debug, Serialize)]
pub struct SessionCreated {
    pub session_id: String,
}

/// A turn body. The session comes from the path.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TurnBody {
    pub utterance: String,
    pub fields: StructuredFields,
}

pub async fn create_session(
    State(state): State<AppState>,
    Json(body): Json<CreateSession>,
) -> Result<(StatusCode, Json<SessionCreated>), ApiError> {
    let patient_id = body.patient_id.trim();
    if patient_id.is_empty() {
        return Err(ApiError::BadRequest("patient_id must not be empty".to_string()));
    }
    let session_id = state.engine.start_session(patient_id).await;
    Ok((StatusCode::CREATED, Json(SessionCreated { session_id })))
}

pub async fn submit_turn(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<TurnBody>,
) -> Result<Json<TurnResponse>, ApiError> {
    let request = TurnRequest {
        session_id: id,
        utterance: body.utterance,
        fields: body.fields,
    };
    let response = state.engine.handle_turn(request).await?;
    Ok(Json(response))
}

pub async fn end_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ArchivedSession>, ApiError> {
    let archived = state.engine.end_session(&id)?;
    Ok(Json(archived))
}
