pub mod memory;
pub mod pg;
pub mod result_repo;
pub mod wallet_repo;

pub use memory::MemoryStore;
pub use pg::PgStore;

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::models::{ScoredResult, WalletProfile};

/// Persistence collaborator for the scoring pipeline.
///
/// Wallet profiles are read-only from the pipeline's side; every call returns
/// an owned snapshot.
#[async_trait]
pub trait RiskStore: Send + Sync {
    /// Profile for `address`. An unknown address yields an empty profile,
    /// not an error.
    async fn get_wallet_profile(&self, address: &str) -> anyhow::Result<WalletProfile>;

    /// Upsert keyed by `tx_id`.
    async fn save(&self, result: &ScoredResult) -> anyhow::Result<()>;

    async fn get_result(&self, tx_id: &str) -> anyhow::Result<Option<ScoredResult>>;

    /// Results with `score >= threshold`, highest score first.
    async fn list_alerts(&self, threshold: Decimal, limit: i64) -> anyhow::Result<Vec<ScoredResult>>;

    /// Results where `address` is sender or receiver, newest first.
    async fn list_by_wallet(&self, address: &str, limit: i64) -> anyhow::Result<Vec<ScoredResult>>;

    async fn health_check(&self) -> anyhow::Result<()>;

    fn backend(&self) -> &'static str;
}

pub async fn init_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    // Verify connectivity
    sqlx::query("SELECT 1").execute(&pool).await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}
