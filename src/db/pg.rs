use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;

use super::{result_repo, wallet_repo, RiskStore};
use crate::models::{ScoredResult, WalletProfile};

/// Postgres-backed store.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RiskStore for PgStore {
    async fn get_wallet_profile(&self, address: &str) -> anyhow::Result<WalletProfile> {
        let profile = wallet_repo::get_profile(&self.pool, address).await?;
        Ok(profile.unwrap_or_else(|| WalletProfile::empty(address)))
    }

    async fn save(&self, result: &ScoredResult) -> anyhow::Result<()> {
        let fingerprint = result.tx.fingerprint();
        let previous = result_repo::upsert_result(&self.pool, result, &fingerprint).await?;

        if let Some(previous) = previous {
            if previous != fingerprint {
                tracing::warn!(
                    tx_id = %result.tx.tx_id,
                    "tx_id resubmitted with different contents, stored result replaced"
                );
            }
        }
        Ok(())
    }

    async fn get_result(&self, tx_id: &str) -> anyhow::Result<Option<ScoredResult>> {
        result_repo::get_result(&self.pool, tx_id).await
    }

    async fn list_alerts(&self, threshold: Decimal, limit: i64) -> anyhow::Result<Vec<ScoredResult>> {
        result_repo::get_alerts(&self.pool, threshold, limit).await
    }

    async fn list_by_wallet(&self, address: &str, limit: i64) -> anyhow::Result<Vec<ScoredResult>> {
        result_repo::get_results_by_wallet(&self.pool, address, limit).await
    }

    async fn health_check(&self) -> anyhow::Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}
