use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use serde_json::Value;

use crate::errors::{AppError, ValidationError};
use crate::models::{BatchOutcome, RawTransaction, ScoredResult};
use crate::AppState;

/// Largest batch accepted in one request.
pub const MAX_BATCH_ITEMS: usize = 1000;

fn parse_body(body: &[u8]) -> Result<Value, ValidationError> {
    serde_json::from_slice(body).map_err(|e| ValidationError::single("body", format!("invalid JSON: {e}")))
}

pub async fn score_one(State(state): State<AppState>, body: Bytes) -> Result<Json<ScoredResult>, AppError> {
    let raw = RawTransaction::from_value(parse_body(&body)?)?;
    let result = state.engine.process(raw).await?;
    Ok(Json(result))
}

pub async fn score_batch(State(state): State<AppState>, body: Bytes) -> Result<Json<BatchOutcome>, AppError> {
    let mut value = parse_body(&body)?;
    let transactions = match value.get_mut("transactions").map(Value::take) {
        Some(Value::Array(items)) => items,
        _ => {
            return Err(ValidationError::single("transactions", "must be a list of transactions").into());
        }
    };

    if transactions.len() > MAX_BATCH_ITEMS {
        return Err(ValidationError::single(
            "transactions",
            format!("at most {MAX_BATCH_ITEMS} transactions per batch"),
        )
        .into());
    }

    Ok(Json(state.batch.process_batch(transactions).await))
}
