mod common;

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use serde_json::json;

use common::{build_state, established_wallet, large_payment, scored_at, small_payment, test_config, young_wallet};
use txrisk::config::ScoringConfig;
use txrisk::intelligence::{FeatureExtractor, RiskScorer};
use txrisk::models::{Category, Flag, ProfileSnapshot, RawTransaction, RiskBucket, WalletProfile};

fn raw(value: serde_json::Value) -> RawTransaction {
    RawTransaction::from_value(value).unwrap()
}

#[tokio::test]
async fn test_large_payment_from_young_wallet_is_medium() {
    let (state, store) = build_state(test_config());
    store.seed_profile(young_wallet("rNew"));

    let result = state.engine.process(raw(large_payment("s1", ""))).await.unwrap();

    assert_eq!(result.flags, vec![Flag::HighAmount, Flag::NewAddress]);
    assert_eq!(result.score, Decimal::new(7, 1));
    assert_eq!(result.risk_bucket, RiskBucket::Medium);
    // Below the alert threshold: nothing broadcast.
    assert_eq!(state.registry.last_seq(), 0);
}

#[tokio::test]
async fn test_denylisted_memo_clamps_to_high() {
    let (state, store) = build_state(test_config());
    store.seed_profile(young_wallet("rNew"));

    let result = state
        .engine
        .process(raw(large_payment("s2", "sent through the TUMBLER")))
        .await
        .unwrap();

    assert_eq!(
        result.flags,
        vec![Flag::HighAmount, Flag::NewAddress, Flag::SuspiciousPattern]
    );
    assert_eq!(result.score, Decimal::ONE);
    assert_eq!(result.risk_bucket, RiskBucket::High);
    assert_eq!(state.registry.last_seq(), 1);
}

#[tokio::test]
async fn test_batch_with_missing_tx_id() {
    let (state, _store) = build_state(test_config());

    let mut second = small_payment("x", "rB");
    second.as_object_mut().unwrap().remove("tx_id");
    let outcome = state
        .batch
        .process_batch(vec![small_payment("first", "rA"), second, small_payment("third", "rC")])
        .await;

    assert_eq!(outcome.summary.total, 3);
    assert!(outcome.items[0].is_ok());
    assert!(outcome.items[2].is_ok());
    let rejected = serde_json::to_value(&outcome.items[1]).unwrap();
    assert_eq!(rejected["error"], "ValidationError");
    assert_eq!(rejected["fields"][0]["field"], "tx_id");
}

#[tokio::test]
async fn test_rescoring_is_identical() {
    let (state, store) = build_state(test_config());
    store.seed_profile(young_wallet("rNew"));

    let first = state.engine.process(raw(large_payment("idem", "mixer"))).await.unwrap();
    let second = state.engine.process(raw(large_payment("idem", "mixer"))).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
    // Identical alert is not broadcast twice.
    assert_eq!(state.registry.last_seq(), 1);
    assert_eq!(store.result_count(), 1);
}

#[tokio::test]
async fn test_profile_error_uses_fallback_profile() {
    let (state, store) = build_state(test_config());
    store.seed_profile(established_wallet("rNew"));
    store.set_profiles_unavailable(true);

    let result = state.engine.process(raw(large_payment("fb", ""))).await.unwrap();

    // Fallback: ratio 1.0 and novelty true.
    assert_eq!(result.flags, vec![Flag::NewAddress, Flag::ProfileUnavailable]);
    assert_eq!(result.score, Decimal::new(3, 1));
    assert_eq!(result.risk_bucket, RiskBucket::Low);
}

#[tokio::test]
async fn test_profile_timeout_uses_fallback_profile() {
    let mut config = test_config();
    config.profile_timeout = Duration::from_millis(10);
    let (state, store) = build_state(config);
    store.seed_profile(established_wallet("rNew"));
    store.set_profile_delay(Some(Duration::from_millis(300)));

    let result = state.engine.process(raw(large_payment("slow", ""))).await.unwrap();
    assert!(result.has_flag(Flag::ProfileUnavailable));
}

#[tokio::test]
async fn test_incoming_transfer_scored_against_receiver() {
    let (state, store) = build_state(test_config());
    store.seed_profile(established_wallet("rX"));

    let mut tx = large_payment("in-1", "");
    tx["direction"] = json!("in");
    tx["amount"] = json!(900);
    let result = state.engine.process(raw(tx)).await.unwrap();

    assert!(result.flags.is_empty());
    assert_eq!(result.category, Category::Transfer);
}

#[tokio::test]
async fn test_batch_preserves_input_order_under_parallelism() {
    let mut config = test_config();
    config.batch_concurrency = 8;
    let (state, store) = build_state(config);
    store.set_profile_delay(Some(Duration::from_millis(5)));

    let ids: Vec<String> = (0..50).map(|i| format!("order-{i:02}")).collect();
    let batch = ids.iter().map(|id| small_payment(id, "rA")).collect();
    let outcome = state.batch.process_batch(batch).await;

    for (i, item) in outcome.items.iter().enumerate() {
        assert_eq!(item.result().unwrap().tx.tx_id, ids[i]);
    }
    assert_eq!(outcome.summary.total, 50);
    assert_eq!(outcome.summary.medium_risk, 50);
    assert_eq!(outcome.summary.avg_risk, Decimal::new(7, 1));
}

#[test]
fn test_bucket_boundaries_from_weight_sums() {
    let config = Arc::new(ScoringConfig::default());
    let extractor = FeatureExtractor::new(config.clone());
    let scorer = RiskScorer::new(config.weights.clone());
    let tx = raw(large_payment("edge", "")).validate().unwrap();

    // Fallback profile triggers only new_address (0.3).
    let features = extractor.extract(&tx, &ProfileSnapshot::Unavailable).unwrap();
    let (score, _) = scorer.score(&features);
    assert_eq!(score, Decimal::new(3, 1));
    assert_eq!(RiskBucket::from_score(score), RiskBucket::Low);

    // high_amount + new_address, no quiet hours: 0.7.
    let young = ProfileSnapshot::Available(WalletProfile {
        first_seen: Some(scored_at()),
        ..young_wallet("rNew")
    });
    let (score, _) = scorer.score(&extractor.extract(&tx, &young).unwrap());
    assert_eq!(RiskBucket::from_score(score), RiskBucket::Medium);

    assert_eq!(RiskBucket::from_score(Decimal::new(75, 2)), RiskBucket::High);
    assert_eq!(RiskBucket::from_score(Decimal::new(5, 1)), RiskBucket::Medium);
    assert_eq!(RiskBucket::from_score(Decimal::new(4999, 4)), RiskBucket::Low);
}
