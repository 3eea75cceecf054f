//! In-process store, used when no database is configured and by tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;

use super::RiskStore;
use crate::models::{ScoredResult, WalletProfile};

struct StoredResult {
    result: ScoredResult,
    fingerprint: String,
    scored_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct MemoryStore {
    profiles: RwLock<HashMap<String, WalletProfile>>,
    results: RwLock<HashMap<String, StoredResult>>,
    profiles_unavailable: AtomicBool,
    profile_delay: RwLock<Option<Duration>>,
    fail_saves: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_profile(&self, profile: WalletProfile) {
        self.profiles.write().insert(profile.address.clone(), profile);
    }

    /// Make every profile read fail, as if the backend were down.
    pub fn set_profiles_unavailable(&self, unavailable: bool) {
        self.profiles_unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Delay every profile read, to exercise the caller's timeout.
    pub fn set_profile_delay(&self, delay: Option<Duration>) {
        *self.profile_delay.write() = delay;
    }

    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn result_count(&self) -> usize {
        self.results.read().len()
    }
}

#[async_trait]
impl RiskStore for MemoryStore {
    async fn get_wallet_profile(&self, address: &str) -> anyhow::Result<WalletProfile> {
        let delay = *self.profile_delay.read();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.profiles_unavailable.load(Ordering::SeqCst) {
            anyhow::bail!("wallet profile backend unavailable");
        }
        Ok(self
            .profiles
            .read()
            .get(address)
            .cloned()
            .unwrap_or_else(|| WalletProfile::empty(address)))
    }

    async fn save(&self, result: &ScoredResult) -> anyhow::Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            anyhow::bail!("result store unavailable");
        }

        let fingerprint = result.tx.fingerprint();
        let previous = self.results.write().insert(
            result.tx.tx_id.clone(),
            StoredResult {
                result: result.clone(),
                fingerprint: fingerprint.clone(),
                scored_at: Utc::now(),
            },
        );

        if let Some(previous) = previous {
            if previous.fingerprint != fingerprint {
                tracing::warn!(
                    tx_id = %result.tx.tx_id,
                    "tx_id resubmitted with different contents, stored result replaced"
                );
            }
        }
        Ok(())
    }

    async fn get_result(&self, tx_id: &str) -> anyhow::Result<Option<ScoredResult>> {
        Ok(self.results.read().get(tx_id).map(|s| s.result.clone()))
    }

    async fn list_alerts(&self, threshold: Decimal, limit: i64) -> anyhow::Result<Vec<ScoredResult>> {
        let results = self.results.read();
        let mut hits: Vec<&StoredResult> = results.values().filter(|s| s.result.score >= threshold).collect();
        hits.sort_by(|a, b| {
            b.result
                .score
                .cmp(&a.result.score)
                .then_with(|| b.scored_at.cmp(&a.scored_at))
        });
        Ok(hits
            .into_iter()
            .take(limit.max(0) as usize)
            .map(|s| s.result.clone())
            .collect())
    }

    async fn list_by_wallet(&self, address: &str, limit: i64) -> anyhow::Result<Vec<ScoredResult>> {
        let results = self.results.read();
        let mut hits: Vec<&ScoredResult> = results
            .values()
            .map(|s| &s.result)
            .filter(|r| r.tx.touches(address))
            .collect();
        hits.sort_by(|a, b| b.tx.timestamp.cmp(&a.tx.timestamp));
        Ok(hits.into_iter().take(limit.max(0) as usize).cloned().collect())
    }

    async fn health_check(&self) -> anyhow::Result<()> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
