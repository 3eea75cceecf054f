use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::Direction;
use crate::errors::{FieldError, ValidationError};

/// A validated transaction. Immutable once accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub tx_id: String,
    pub timestamp: DateTime<Utc>,
    pub chain: String,
    pub from_addr: String,
    pub to_addr: String,
    pub amount: Decimal,
    pub symbol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee: Option<Decimal>,
}

impl Transaction {
    /// Address whose history the transaction is scored against: the receiver
    /// for incoming transfers, the sender otherwise.
    pub fn subject_address(&self) -> &str {
        match self.direction {
            Some(Direction::In) => &self.to_addr,
            _ => &self.from_addr,
        }
    }

    pub fn touches(&self, address: &str) -> bool {
        self.from_addr == address || self.to_addr == address
    }

    /// Content hash over every field, used to spot a `tx_id` resubmitted
    /// with different contents.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for part in [
            self.tx_id.as_str(),
            &self.timestamp.to_rfc3339(),
            &self.chain,
            &self.from_addr,
            &self.to_addr,
            &self.amount.normalize().to_string(),
            &self.symbol,
            self.direction.map(|d| d.as_str()).unwrap_or(""),
            self.memo.as_deref().unwrap_or(""),
            &self.fee.map(|f| f.normalize().to_string()).unwrap_or_default(),
        ] {
            hasher.update(part.as_bytes());
            hasher.update([0u8]);
        }
        URL_SAFE_NO_PAD.encode(hasher.finalize())
    }
}

/// Transaction as submitted by a client, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTransaction {
    pub tx_id: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub chain: Option<String>,
    pub from_addr: Option<String>,
    pub to_addr: Option<String>,
    pub amount: Option<Decimal>,
    pub symbol: Option<String>,
    pub direction: Option<Direction>,
    pub memo: Option<String>,
    pub fee: Option<Decimal>,
}

impl RawTransaction {
    /// Decode a JSON value. Type errors become a single `body` field error.
    pub fn from_value(value: serde_json::Value) -> Result<Self, ValidationError> {
        serde_json::from_value(value)
            .map_err(|e| ValidationError::single("body", e.to_string()))
    }

    /// Peek at the id, for error reporting on rejected items.
    pub fn tx_id_hint(&self) -> Option<&str> {
        self.tx_id.as_deref().filter(|s| !s.trim().is_empty())
    }

    /// Check required fields and non-negativity. Collects every problem
    /// instead of stopping at the first one.
    pub fn validate(self) -> Result<Transaction, ValidationError> {
        let mut fields = Vec::new();

        let tx_id = required_str(self.tx_id, "tx_id", &mut fields);
        let chain = required_str(self.chain, "chain", &mut fields);
        let from_addr = required_str(self.from_addr, "from_addr", &mut fields);
        let to_addr = required_str(self.to_addr, "to_addr", &mut fields);
        let symbol = required_str(self.symbol, "symbol", &mut fields);

        if self.timestamp.is_none() {
            fields.push(FieldError::missing("timestamp"));
        }

        match self.amount {
            None => fields.push(FieldError::missing("amount")),
            Some(a) if a.is_sign_negative() && !a.is_zero() => {
                fields.push(FieldError::new("amount", "must be non-negative"));
            }
            Some(_) => {}
        }

        if let Some(fee) = self.fee {
            if fee.is_sign_negative() && !fee.is_zero() {
                fields.push(FieldError::new("fee", "must be non-negative"));
            }
        }

        match (tx_id, self.timestamp, chain, from_addr, to_addr, self.amount, symbol) {
            (Some(tx_id), Some(timestamp), Some(chain), Some(from_addr), Some(to_addr), Some(amount), Some(symbol))
                if fields.is_empty() =>
            {
                Ok(Transaction {
                    tx_id,
                    timestamp,
                    chain: chain.to_uppercase(),
                    from_addr,
                    to_addr,
                    amount,
                    symbol,
                    direction: self.direction,
                    memo: self.memo,
                    fee: self.fee,
                })
            }
            _ => Err(ValidationError { fields }),
        }
    }
}

fn required_str(value: Option<String>, field: &'static str, errors: &mut Vec<FieldError>) -> Option<String> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Some(v),
        _ => {
            errors.push(FieldError::missing(field));
            None
        }
    }
}
