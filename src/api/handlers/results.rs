use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use super::alerts::clamp_limit;
use super::ApiResponse;
use crate::errors::AppError;
use crate::models::ScoredResult;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

pub async fn detail(
    State(state): State<AppState>,
    Path(tx_id): Path<String>,
) -> Result<Json<ApiResponse<ScoredResult>>, AppError> {
    match state.store.get_result(&tx_id).await? {
        Some(result) => Ok(Json(ApiResponse::ok(result))),
        None => Err(AppError::NotFound(format!("no result for tx_id {tx_id}"))),
    }
}

pub async fn by_wallet(
    State(state): State<AppState>,
    Path(address): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<ApiResponse<Vec<ScoredResult>>>, AppError> {
    let results = state.store.list_by_wallet(&address, clamp_limit(query.limit)).await?;
    Ok(Json(ApiResponse::ok(results)))
}
