use axum::extract::State;
use axum::Json;

use super::ApiResponse;
use crate::alerts::ConnectionInfo;
use crate::AppState;

pub async fn list(State(state): State<AppState>) -> Json<ApiResponse<Vec<ConnectionInfo>>> {
    Json(ApiResponse::ok(state.registry.connections()))
}
