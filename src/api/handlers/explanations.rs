use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use super::ApiResponse;
use crate::errors::AppError;
use crate::intelligence::ExplanationTrail;
use crate::models::RiskSignal;
use crate::AppState;

/// Trail in evaluation order plus the triggered signals ranked for narration.
#[derive(Serialize)]
pub struct ExplanationView {
    #[serde(flatten)]
    pub trail: ExplanationTrail,
    pub ranked: Vec<RiskSignal>,
}

pub async fn detail(
    State(state): State<AppState>,
    Path(tx_id): Path<String>,
) -> Result<Json<ApiResponse<ExplanationView>>, AppError> {
    let trail = state
        .engine
        .recorder()
        .get(&tx_id)
        .ok_or_else(|| AppError::NotFound(format!("no explanation for tx_id {tx_id}")))?;

    let ranked = trail.ranked().into_iter().cloned().collect();
    Ok(Json(ApiResponse::ok(ExplanationView { trail, ranked })))
}
