use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};

use crate::models::{Category, Direction, Flag, RiskBucket, ScoredResult, Transaction};

/// Flat row shape of `scored_results`.
#[derive(Debug, Clone, FromRow)]
pub struct ScoredResultRow {
    pub tx_id: String,
    pub tx_timestamp: DateTime<Utc>,
    pub chain: String,
    pub from_addr: String,
    pub to_addr: String,
    pub amount: Decimal,
    pub symbol: String,
    pub direction: Option<String>,
    pub memo: Option<String>,
    pub fee: Option<Decimal>,
    pub score: Decimal,
    pub flags: Vec<String>,
    pub category: String,
    pub risk_bucket: String,
    pub fingerprint: String,
    pub scored_at: DateTime<Utc>,
}

impl TryFrom<ScoredResultRow> for ScoredResult {
    type Error = anyhow::Error;

    fn try_from(row: ScoredResultRow) -> Result<Self, Self::Error> {
        let flags = row
            .flags
            .iter()
            .map(|f| f.parse::<Flag>())
            .collect::<anyhow::Result<Vec<_>>>()?;
        let direction: Option<Direction> = row.direction.as_deref().map(str::parse).transpose()?;

        Ok(ScoredResult {
            tx: Transaction {
                tx_id: row.tx_id,
                timestamp: row.tx_timestamp,
                chain: row.chain,
                from_addr: row.from_addr,
                to_addr: row.to_addr,
                amount: row.amount,
                symbol: row.symbol,
                direction,
                memo: row.memo,
                fee: row.fee,
            },
            score: row.score,
            flags,
            category: row.category.parse::<Category>()?,
            risk_bucket: RiskBucket::from_score(row.score),
        })
    }
}

fn into_results(rows: Vec<ScoredResultRow>) -> anyhow::Result<Vec<ScoredResult>> {
    rows.into_iter().map(ScoredResult::try_from).collect()
}

const COLUMNS: &str = "tx_id, tx_timestamp, chain, from_addr, to_addr, amount, symbol, direction, \
                       memo, fee, score, flags, category, risk_bucket, fingerprint, scored_at";

/// Insert or replace the result for `tx_id`. Returns the fingerprint that was
/// stored before this call, if any.
pub async fn upsert_result(
    pool: &PgPool,
    result: &ScoredResult,
    fingerprint: &str,
) -> anyhow::Result<Option<String>> {
    let tx = &result.tx;
    let flags: Vec<&str> = result.flags.iter().map(|f| f.as_str()).collect();

    let previous = sqlx::query_scalar::<_, Option<String>>(
        r#"
        WITH prev AS (SELECT fingerprint FROM scored_results WHERE tx_id = $1)
        INSERT INTO scored_results
            (tx_id, tx_timestamp, chain, from_addr, to_addr, amount, symbol, direction,
             memo, fee, score, flags, category, risk_bucket, fingerprint)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
        ON CONFLICT (tx_id) DO UPDATE SET
            tx_timestamp = EXCLUDED.tx_timestamp,
            chain = EXCLUDED.chain,
            from_addr = EXCLUDED.from_addr,
            to_addr = EXCLUDED.to_addr,
            amount = EXCLUDED.amount,
            symbol = EXCLUDED.symbol,
            direction = EXCLUDED.direction,
            memo = EXCLUDED.memo,
            fee = EXCLUDED.fee,
            score = EXCLUDED.score,
            flags = EXCLUDED.flags,
            category = EXCLUDED.category,
            risk_bucket = EXCLUDED.risk_bucket,
            fingerprint = EXCLUDED.fingerprint,
            scored_at = NOW()
        RETURNING (SELECT fingerprint FROM prev)
        "#,
    )
    .bind(&tx.tx_id)
    .bind(tx.timestamp)
    .bind(&tx.chain)
    .bind(&tx.from_addr)
    .bind(&tx.to_addr)
    .bind(tx.amount)
    .bind(&tx.symbol)
    .bind(tx.direction.map(|d| d.as_str()))
    .bind(tx.memo.as_deref())
    .bind(tx.fee)
    .bind(result.score)
    .bind(&flags)
    .bind(result.category.as_str())
    .bind(result.risk_bucket.as_str())
    .bind(fingerprint)
    .fetch_one(pool)
    .await?;

    Ok(previous)
}

pub async fn get_result(pool: &PgPool, tx_id: &str) -> anyhow::Result<Option<ScoredResult>> {
    let row = sqlx::query_as::<_, ScoredResultRow>(&format!(
        "SELECT {COLUMNS} FROM scored_results WHERE tx_id = $1"
    ))
    .bind(tx_id)
    .fetch_optional(pool)
    .await?;

    row.map(ScoredResult::try_from).transpose()
}

/// Results at or above `threshold`, highest score first.
pub async fn get_alerts(pool: &PgPool, threshold: Decimal, limit: i64) -> anyhow::Result<Vec<ScoredResult>> {
    let rows = sqlx::query_as::<_, ScoredResultRow>(&format!(
        "SELECT {COLUMNS} FROM scored_results WHERE score >= $1 \
         ORDER BY score DESC, scored_at DESC LIMIT $2"
    ))
    .bind(threshold)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    into_results(rows)
}

pub async fn get_results_by_wallet(pool: &PgPool, address: &str, limit: i64) -> anyhow::Result<Vec<ScoredResult>> {
    let rows = sqlx::query_as::<_, ScoredResultRow>(&format!(
        "SELECT {COLUMNS} FROM scored_results WHERE from_addr = $1 OR to_addr = $1 \
         ORDER BY tx_timestamp DESC LIMIT $2"
    ))
    .bind(address)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    into_results(rows)
}
