use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tower::ServiceExt;

use txrisk::api::router::create_router;
use txrisk::config::{AppConfig, ScoringConfig};
use txrisk::db::MemoryStore;
use txrisk::models::WalletProfile;
use txrisk::AppState;

/// Fixed mid-afternoon UTC instant, outside the default quiet window.
#[allow(dead_code)]
pub fn scored_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 14, 0, 0).unwrap()
}

#[allow(dead_code)]
pub fn test_config() -> AppConfig {
    AppConfig {
        host: "127.0.0.1".into(),
        port: 0,
        batch_concurrency: 4,
        profile_timeout: Duration::from_millis(200),
        ..AppConfig::default()
    }
}

/// App state backed by a fresh in-memory store.
#[allow(dead_code)]
pub fn build_state(config: AppConfig) -> (AppState, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let state = AppState::new(config, Arc::new(ScoringConfig::default()), store.clone(), None);
    (state, store)
}

#[allow(dead_code)]
pub fn build_test_app() -> (axum::Router, AppState, Arc<MemoryStore>) {
    let (state, store) = build_state(test_config());
    (create_router(state.clone()), state, store)
}

/// Wallet with a 30-day average of 1000 first seen one hour before `scored_at()`.
#[allow(dead_code)]
pub fn young_wallet(address: &str) -> WalletProfile {
    WalletProfile {
        address: address.into(),
        avg_amount_30d: Decimal::from(1000),
        tx_count: 3,
        first_seen: Some(scored_at() - ChronoDuration::hours(1)),
        prior_flags: vec![],
    }
}

#[allow(dead_code)]
pub fn established_wallet(address: &str) -> WalletProfile {
    WalletProfile {
        address: address.into(),
        avg_amount_30d: Decimal::from(1000),
        tx_count: 250,
        first_seen: Some(scored_at() - ChronoDuration::days(400)),
        prior_flags: vec![],
    }
}

/// Large outgoing payment from `rNew`.
#[allow(dead_code)]
pub fn large_payment(tx_id: &str, memo: &str) -> Value {
    json!({
        "tx_id": tx_id,
        "timestamp": scored_at().to_rfc3339(),
        "chain": "XRPL",
        "from_addr": "rNew",
        "to_addr": "rX",
        "amount": 50000,
        "symbol": "XRP",
        "direction": "out",
        "memo": memo,
    })
}

#[allow(dead_code)]
pub fn small_payment(tx_id: &str, from: &str) -> Value {
    json!({
        "tx_id": tx_id,
        "timestamp": scored_at().to_rfc3339(),
        "chain": "XRPL",
        "from_addr": from,
        "to_addr": "rShop",
        "amount": "250.5",
        "symbol": "XRP",
        "direction": "out",
    })
}

#[allow(dead_code)]
pub async fn send(app: &axum::Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body).into()))
    };
    (status, json)
}

#[allow(dead_code)]
pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[allow(dead_code)]
pub fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}
