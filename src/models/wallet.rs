use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Rolling per-address statistics, owned by the persistence layer.
/// Scoring only ever sees an owned copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct WalletProfile {
    pub address: String,
    pub avg_amount_30d: Decimal,
    pub tx_count: i64,
    pub first_seen: Option<DateTime<Utc>>,
    pub prior_flags: Vec<String>,
}

impl WalletProfile {
    /// Profile for an address the store has never seen.
    pub fn empty(address: &str) -> Self {
        Self {
            address: address.to_string(),
            avg_amount_30d: Decimal::ZERO,
            tx_count: 0,
            first_seen: None,
            prior_flags: Vec::new(),
        }
    }
}

/// What the pipeline managed to read from the store for one scoring call.
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileSnapshot {
    Available(WalletProfile),
    /// Store errored or timed out; scoring uses the fallback profile.
    Unavailable,
}

impl ProfileSnapshot {
    pub fn is_available(&self) -> bool {
        matches!(self, ProfileSnapshot::Available(_))
    }
}
