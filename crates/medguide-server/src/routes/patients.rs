use axum::extract::{Path, State};
use axum::Json;
use medguide_orchestrator::PatientReview;

use crate::error::ApiError;
use crate::state::AppState;

/// Risk staging and medication safety from the patient's chart.
pub async fn review_patient(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PatientReview>, ApiError> {
    let review = state.engine.review_patient(&id).await?;
    Ok(Json(review))
}
