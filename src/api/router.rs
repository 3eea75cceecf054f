use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::AppState;
use super::auth::require_auth;
use super::handlers;

pub fn create_router(state: AppState) -> Router {
    // Public routes: no authentication required
    let public = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::metrics::render));

    // Protected API routes: require Bearer token when API_TOKEN is set
    let protected = Router::new()
        // Scoring
        .route("/api/score", post(handlers::score::score_one))
        .route("/api/score/batch", post(handlers::score::score_batch))
        // Stored results
        .route("/api/alerts", get(handlers::alerts::list))
        .route("/api/results/:tx_id", get(handlers::results::detail))
        .route("/api/wallets/:address/results", get(handlers::results::by_wallet))
        .route("/api/explanations/:tx_id", get(handlers::explanations::detail))
        // Real-time channel
        .route("/api/subscriptions", get(handlers::subscriptions::list))
        .route("/ws", get(handlers::ws::handler))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    public
        .merge(protected)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
