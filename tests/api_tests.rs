mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;

use common::{build_state, build_test_app, get, large_payment, post_json, send, small_payment, test_config, young_wallet};
use txrisk::api::router::create_router;

#[tokio::test]
async fn test_health_check() {
    let (app, _state, _store) = build_test_app();

    let (status, json) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["store"], "memory");
    assert_eq!(json["connections"], 0);
}

#[tokio::test]
async fn test_metrics_endpoint_renders_text() {
    let (app, _state, _store) = build_test_app();

    let body = get_text(&app, "/metrics").await;
    assert!(body.contains("transactions_scored_total"));
}

#[tokio::test]
async fn test_score_medium_risk_scenario() {
    let (app, _state, store) = build_test_app();
    store.seed_profile(young_wallet("rNew"));

    let (status, json) = send(&app, post_json("/api/score", &large_payment("tx-1", ""))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["tx_id"], "tx-1");
    assert_eq!(json["flags"], json!(["high_amount", "new_address"]));
    assert_eq!(json["score"].as_f64(), Some(0.7));
    assert_eq!(json["risk_bucket"], "medium");
    assert_eq!(json["chain"], "XRPL");
}

#[tokio::test]
async fn test_score_denylisted_memo_saturates() {
    let (app, _state, store) = build_test_app();
    store.seed_profile(young_wallet("rNew"));

    let (status, json) = send(&app, post_json("/api/score", &large_payment("tx-2", "via Mixer pool"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["flags"], json!(["high_amount", "new_address", "suspicious_pattern"]));
    assert_eq!(json["score"].as_f64(), Some(1.0));
    assert_eq!(json["risk_bucket"], "high");
    assert_eq!(json["category"], "mixing");
}

#[tokio::test]
async fn test_score_rejects_missing_fields() {
    let (app, _state, store) = build_test_app();

    let mut body = large_payment("tx-3", "");
    body.as_object_mut().unwrap().remove("tx_id");
    body.as_object_mut().unwrap().remove("symbol");
    body["amount"] = json!(-1);

    let (status, json) = send(&app, post_json("/api/score", &body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "ValidationError");
    let fields: Vec<&str> = json["fields"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["field"].as_str().unwrap())
        .collect();
    assert!(fields.contains(&"tx_id"));
    assert!(fields.contains(&"symbol"));
    assert!(fields.contains(&"amount"));
    assert_eq!(store.result_count(), 0);
}

#[tokio::test]
async fn test_score_rejects_malformed_json() {
    let (app, _state, _store) = build_test_app();

    let req = Request::builder()
        .method("POST")
        .uri("/api/score")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, json) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["fields"][0]["field"], "body");
}

#[tokio::test]
async fn test_degraded_profile_still_scores() {
    let (app, _state, store) = build_test_app();
    store.set_profiles_unavailable(true);

    let (status, json) = send(&app, post_json("/api/score", &small_payment("tx-4", "rA"))).await;
    assert_eq!(status, StatusCode::OK);
    let flags = json["flags"].as_array().unwrap();
    assert!(flags.contains(&json!("profile_unavailable")));
    assert!(flags.contains(&json!("new_address")));
    assert!(!flags.contains(&json!("high_amount")));
}

#[tokio::test]
async fn test_batch_with_invalid_item() {
    let (app, _state, _store) = build_test_app();

    let mut missing_id = small_payment("ignored", "rB");
    missing_id.as_object_mut().unwrap().remove("tx_id");
    let body = json!({
        "transactions": [small_payment("b-0", "rA"), missing_id, small_payment("b-2", "rC")]
    });

    let (status, json) = send(&app, post_json("/api/score/batch", &body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["summary"]["total"], 3);
    assert_eq!(json["items"][0]["ok"], true);
    assert_eq!(json["items"][0]["tx_id"], "b-0");
    assert_eq!(json["items"][1]["ok"], false);
    assert_eq!(json["items"][1]["error"], "ValidationError");
    assert_eq!(json["items"][1]["index"], 1);
    assert_eq!(json["items"][2]["ok"], true);
    assert_eq!(json["items"][2]["tx_id"], "b-2");
}

#[tokio::test]
async fn test_batch_requires_transactions_list() {
    let (app, _state, _store) = build_test_app();

    let (status, json) = send(&app, post_json("/api/score/batch", &json!({"items": []}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["fields"][0]["field"], "transactions");
}

#[tokio::test]
async fn test_alerts_filtered_by_threshold() {
    let (app, _state, store) = build_test_app();
    store.seed_profile(young_wallet("rNew"));

    send(&app, post_json("/api/score", &large_payment("medium", ""))).await;
    send(&app, post_json("/api/score", &large_payment("high", "mixer"))).await;

    let (status, json) = send(&app, get("/api/alerts?limit=5000")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["threshold"].as_f64(), Some(0.75));
    assert_eq!(json["count"], 1);
    assert_eq!(json["items"][0]["tx_id"], "high");

    let (_, json) = send(&app, get("/api/alerts?threshold=0.5")).await;
    assert_eq!(json["count"], 2);
    assert_eq!(json["items"][0]["tx_id"], "high");

    let (status, _) = send(&app, get("/api/alerts?threshold=2")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_result_lookup_and_wallet_history() {
    let (app, _state, _store) = build_test_app();
    send(&app, post_json("/api/score", &small_payment("r-1", "rA"))).await;

    let (status, json) = send(&app, get("/api/results/r-1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["tx_id"], "r-1");

    let (status, json) = send(&app, get("/api/results/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["success"], false);

    let (_, json) = send(&app, get("/api/wallets/rShop/results")).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 1);
    let (_, json) = send(&app, get("/api/wallets/rZ/results")).await;
    assert!(json["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_explanation_trail_order_and_ranking() {
    let (app, _state, store) = build_test_app();
    store.seed_profile(young_wallet("rNew"));
    send(&app, post_json("/api/score", &large_payment("e-1", "mixer"))).await;

    let (status, json) = send(&app, get("/api/explanations/e-1")).await;
    assert_eq!(status, StatusCode::OK);

    let evaluated: Vec<&str> = json["data"]["signals"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["name"].as_str().unwrap())
        .collect();
    assert_eq!(
        evaluated,
        vec!["high_amount", "new_address", "off_hours", "suspicious_pattern", "fee_anomaly"]
    );

    let ranked: Vec<&str> = json["data"]["ranked"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["name"].as_str().unwrap())
        .collect();
    assert_eq!(ranked, vec!["suspicious_pattern", "high_amount", "new_address"]);

    let (status, _) = send(&app, get("/api/explanations/missing")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_auth_required_when_token_configured() {
    let mut config = test_config();
    config.api_token = Some("s3cret".into());
    let (state, _store) = build_state(config);
    let app = create_router(state);

    let (status, _) = send(&app, get("/api/alerts")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = Request::builder()
        .uri("/api/alerts")
        .header("authorization", "Bearer wrong")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = Request::builder()
        .uri("/api/alerts")
        .header("authorization", "Bearer s3cret")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);

    // Public routes stay open.
    let (status, _) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_subscriptions_empty_by_default() {
    let (app, _state, _store) = build_test_app();
    let (status, json) = send(&app, get("/api/subscriptions")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["data"].as_array().unwrap().is_empty());
}

async fn get_text(app: &axum::Router, uri: &str) -> String {
    use tower::ServiceExt;
    let resp = app.clone().oneshot(get(uri)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(body.to_vec()).unwrap()
}
