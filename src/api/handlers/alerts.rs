use axum::extract::{Query, State};
use axum::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::ScoredResult;
use crate::AppState;

pub const DEFAULT_LIMIT: i64 = 100;
pub const MAX_LIMIT: i64 = 1000;

#[derive(Debug, Deserialize)]
pub struct AlertsQuery {
    pub limit: Option<i64>,
    pub threshold: Option<String>,
}

#[derive(Serialize)]
pub struct AlertsResponse {
    #[serde(with = "rust_decimal::serde::float")]
    pub threshold: Decimal,
    pub count: usize,
    pub items: Vec<ScoredResult>,
}

pub fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<AlertsQuery>,
) -> Result<Json<AlertsResponse>, AppError> {
    let threshold = match query.threshold.as_deref() {
        None => state.config.alert_threshold,
        Some(raw) => raw
            .trim()
            .parse::<Decimal>()
            .ok()
            .filter(|t| *t >= Decimal::ZERO && *t <= Decimal::ONE)
            .ok_or_else(|| AppError::BadRequest(format!("threshold must be a number in [0, 1], got {raw}")))?,
    };

    let items = state.store.list_alerts(threshold, clamp_limit(query.limit)).await?;
    Ok(Json(AlertsResponse {
        threshold,
        count: items.len(),
        items,
    }))
}
