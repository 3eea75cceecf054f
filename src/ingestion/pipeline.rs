use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, histogram};

use crate::alerts::{AlertRouter, RouteDecision};
use crate::config::ScoringConfig;
use crate::db::RiskStore;
use crate::errors::ValidationError;
use crate::intelligence::{triggered_flags, Categorizer, ExplainabilityRecorder, FeatureExtractor, RiskScorer};
use crate::models::{ProfileSnapshot, RawTransaction, RiskBucket, RiskSignal, ScoredResult, Transaction};

/// Scoring pipeline: validate → fetch profile → extract → score → record →
/// categorize → persist → route.
///
/// Every stage up to categorization is pure and shares no mutable state
/// between calls, so any number of transactions can run through one engine
/// concurrently.
pub struct RiskEngine {
    extractor: FeatureExtractor,
    scorer: RiskScorer,
    categorizer: Categorizer,
    recorder: Arc<ExplainabilityRecorder>,
    router: AlertRouter,
    store: Arc<dyn RiskStore>,
    profile_timeout: Duration,
}

impl RiskEngine {
    pub fn new(
        config: Arc<ScoringConfig>,
        store: Arc<dyn RiskStore>,
        router: AlertRouter,
        recorder: Arc<ExplainabilityRecorder>,
        profile_timeout: Duration,
    ) -> Self {
        Self {
            scorer: RiskScorer::new(config.weights.clone()),
            categorizer: Categorizer::new(&config),
            extractor: FeatureExtractor::new(config),
            recorder,
            router,
            store,
            profile_timeout,
        }
    }

    pub fn recorder(&self) -> &Arc<ExplainabilityRecorder> {
        &self.recorder
    }

    /// Pure scoring of one validated transaction against a profile snapshot.
    /// Returns the result and the full evaluated signal list.
    pub fn score_transaction(
        &self,
        tx: Transaction,
        profile: &ProfileSnapshot,
    ) -> Result<(ScoredResult, Vec<RiskSignal>), ValidationError> {
        let features = self.extractor.extract(&tx, profile)?;
        let (score, signals) = self.scorer.score(&features);
        let flags = triggered_flags(&signals);
        let category = self.categorizer.categorize(&tx, &flags);

        let result = ScoredResult {
            tx,
            score,
            flags,
            category,
            risk_bucket: RiskBucket::from_score(score),
        };
        Ok((result, signals))
    }

    /// Owned profile snapshot for the transaction's subject wallet. Timeout or
    /// store error yields `Unavailable`.
    pub async fn fetch_profile(&self, tx: &Transaction) -> ProfileSnapshot {
        let address = tx.subject_address();
        match tokio::time::timeout(self.profile_timeout, self.store.get_wallet_profile(address)).await {
            Ok(Ok(profile)) => ProfileSnapshot::Available(profile),
            Ok(Err(e)) => {
                tracing::warn!(
                    tx_id = %tx.tx_id,
                    address = %address,
                    error = %e,
                    "Wallet profile fetch failed, scoring with fallback profile"
                );
                ProfileSnapshot::Unavailable
            }
            Err(_) => {
                tracing::warn!(
                    tx_id = %tx.tx_id,
                    address = %address,
                    timeout_ms = self.profile_timeout.as_millis() as u64,
                    "Wallet profile fetch timed out, scoring with fallback profile"
                );
                ProfileSnapshot::Unavailable
            }
        }
    }

    /// Full pipeline for one submitted transaction.
    ///
    /// Only a `ValidationError` is surfaced. Persistence and delivery problems
    /// are logged and counted; the scored result is still returned.
    pub async fn process(&self, raw: RawTransaction) -> Result<ScoredResult, ValidationError> {
        let start = Instant::now();

        let tx = match raw.validate() {
            Ok(tx) => tx,
            Err(e) => {
                counter!("validation_errors_total").increment(1);
                tracing::debug!(error = %e, "Transaction rejected");
                return Err(e);
            }
        };

        let profile = self.fetch_profile(&tx).await;
        if !profile.is_available() {
            counter!("degraded_scoring_total").increment(1);
        }

        let (result, signals) = match self.score_transaction(tx, &profile) {
            Ok(scored) => scored,
            Err(e) => {
                counter!("validation_errors_total").increment(1);
                return Err(e);
            }
        };

        self.recorder.record(&result.tx.tx_id, signals);

        if let Err(e) = self.store.save(&result).await {
            tracing::error!(
                tx_id = %result.tx.tx_id,
                error = %e,
                "Failed to persist scored result"
            );
        }

        let decision = self.router.route(&result);

        counter!("transactions_scored_total").increment(1);
        histogram!("scoring_latency_seconds").record(start.elapsed().as_secs_f64());

        tracing::info!(
            tx_id = %result.tx.tx_id,
            score = %result.score,
            bucket = %result.risk_bucket,
            category = %result.category,
            flags = ?result.flags,
            dispatched = matches!(decision, RouteDecision::Dispatch(_)),
            "Transaction scored"
        );

        Ok(result)
    }
}
