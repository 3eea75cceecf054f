use std::sync::Arc;

use chrono::Timelike;
use rust_decimal::Decimal;

use crate::config::ScoringConfig;
use crate::errors::{FieldError, ValidationError};
use crate::models::{Flag, ProfileSnapshot, Transaction};

/// One evaluated signal before weighting.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub flag: Flag,
    pub triggered: bool,
    pub detail: String,
}

/// Normalized signals for one transaction, in evaluation order.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSet {
    pub tx_id: String,
    pub amount_ratio: Decimal,
    /// False when the wallet profile could not be read and the fallback
    /// profile was used.
    pub profile_available: bool,
    pub features: Vec<Feature>,
}

impl FeatureSet {
    pub fn triggered(&self) -> impl Iterator<Item = Flag> + '_ {
        self.features.iter().filter(|f| f.triggered).map(|f| f.flag)
    }
}

/// Derives risk signals from a transaction and a wallet profile snapshot.
/// Pure: the same inputs always yield the same `FeatureSet`.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    config: Arc<ScoringConfig>,
}

impl FeatureExtractor {
    pub fn new(config: Arc<ScoringConfig>) -> Self {
        Self { config }
    }

    pub fn extract(&self, tx: &Transaction, profile: &ProfileSnapshot) -> Result<FeatureSet, ValidationError> {
        ensure_well_formed(tx)?;

        let amount_ratio = match profile {
            ProfileSnapshot::Available(wallet) => {
                let baseline = wallet.avg_amount_30d.max(self.config.amount_epsilon);
                tx.amount.checked_div(baseline).unwrap_or(Decimal::MAX)
            }
            // Unknown-wallet fallback: amount treated as typical for the wallet.
            ProfileSnapshot::Unavailable => Decimal::ONE,
        };

        let mut features = Vec::with_capacity(Flag::EVALUATED.len());
        for flag in Flag::EVALUATED {
            if !self.config.is_enabled(flag) {
                continue;
            }
            let feature = match flag {
                Flag::HighAmount => self.high_amount(amount_ratio),
                Flag::NewAddress => self.address_novelty(tx, profile),
                Flag::OffHours => self.off_hours(tx),
                Flag::SuspiciousPattern => self.memo_risk(tx),
                Flag::FeeAnomaly => self.fee_anomaly(tx),
                Flag::ProfileUnavailable => continue,
            };
            features.push(feature);
        }

        Ok(FeatureSet {
            tx_id: tx.tx_id.clone(),
            amount_ratio,
            profile_available: profile.is_available(),
            features,
        })
    }

    fn high_amount(&self, ratio: Decimal) -> Feature {
        let multiplier = self.config.high_amount_multiplier;
        Feature {
            flag: Flag::HighAmount,
            triggered: ratio > multiplier,
            detail: format!("amount is {}x the 30-day average (limit {multiplier}x)", ratio.round_dp(2)),
        }
    }

    fn address_novelty(&self, tx: &Transaction, profile: &ProfileSnapshot) -> Feature {
        let (triggered, detail) = match profile {
            ProfileSnapshot::Unavailable => (true, "wallet history unavailable, treated as new".to_string()),
            ProfileSnapshot::Available(wallet) if wallet.tx_count == 0 => {
                (true, "wallet has no prior transactions".to_string())
            }
            ProfileSnapshot::Available(wallet) => match wallet.first_seen {
                None => (true, "wallet first-seen time unknown".to_string()),
                Some(first_seen) => {
                    // Age is measured at the transaction's own timestamp so
                    // re-scoring later gives the same answer.
                    let age = tx.timestamp - first_seen;
                    let recent = age < self.config.novelty_window;
                    (recent, format!("wallet first seen {}h before this transaction", age.num_hours()))
                }
            },
        };
        Feature {
            flag: Flag::NewAddress,
            triggered,
            detail,
        }
    }

    fn off_hours(&self, tx: &Transaction) -> Feature {
        let hour = tx.timestamp.hour();
        let window = self.config.quiet_hours;
        Feature {
            flag: Flag::OffHours,
            triggered: window.contains(hour),
            detail: format!(
                "sent at {hour:02}:00 UTC (quiet window {:02}:00-{:02}:00)",
                window.start_hour, window.end_hour
            ),
        }
    }

    fn memo_risk(&self, tx: &Transaction) -> Feature {
        let memo = tx.memo.as_deref().unwrap_or("");
        let hits = if memo.is_empty() {
            Vec::new()
        } else {
            self.config.memo_denylist.matches(memo)
        };
        let detail = if hits.is_empty() {
            "memo clean".to_string()
        } else {
            format!("memo matched denylisted pattern(s): {}", hits.join(", "))
        };
        Feature {
            flag: Flag::SuspiciousPattern,
            triggered: !hits.is_empty(),
            detail,
        }
    }

    fn fee_anomaly(&self, tx: &Transaction) -> Feature {
        let (triggered, detail) = match tx.fee {
            None => (false, "no fee supplied".to_string()),
            Some(fee) if fee.is_zero() => (true, "zero fee".to_string()),
            Some(fee) => match self.config.fee_norms.get(&tx.chain) {
                Some(typical) => {
                    let ceiling = *typical * self.config.fee_outlier_multiplier;
                    if fee > ceiling {
                        (true, format!("fee {fee} exceeds {ceiling} ({}x typical {} fee)", self.config.fee_outlier_multiplier, tx.chain))
                    } else {
                        (false, format!("fee {fee} within {} norms", tx.chain))
                    }
                }
                None => (false, format!("no fee norm configured for {}", tx.chain)),
            },
        };
        Feature {
            flag: Flag::FeeAnomaly,
            triggered,
            detail,
        }
    }
}

fn ensure_well_formed(tx: &Transaction) -> Result<(), ValidationError> {
    let mut fields = Vec::new();
    for (name, value) in [
        ("tx_id", &tx.tx_id),
        ("chain", &tx.chain),
        ("from_addr", &tx.from_addr),
        ("to_addr", &tx.to_addr),
        ("symbol", &tx.symbol),
    ] {
        if value.trim().is_empty() {
            fields.push(FieldError::missing(name));
        }
    }
    if tx.amount < Decimal::ZERO {
        fields.push(FieldError::new("amount", "must be non-negative"));
    }
    if tx.fee.is_some_and(|f| f < Decimal::ZERO) {
        fields.push(FieldError::new("fee", "must be non-negative"));
    }

    if fields.is_empty() {
        Ok(())
    } else {
        Err(ValidationError { fields })
    }
}
