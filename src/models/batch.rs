use rust_decimal::Decimal;
use serde::Serialize;

use super::{RiskBucket, ScoredResult};
use crate::errors::{FieldError, ValidationError};

/// Per-item batch outcome. Serialized as `{ok: true, ..result}` or
/// `{ok: false, index, tx_id?, error, fields}`.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum BatchItem {
    Scored(ScoredItem),
    Rejected(RejectedItem),
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoredItem {
    pub ok: bool,
    #[serde(flatten)]
    pub result: ScoredResult,
}

#[derive(Debug, Clone, Serialize)]
pub struct RejectedItem {
    pub ok: bool,
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_id: Option<String>,
    pub error: &'static str,
    pub fields: Vec<FieldError>,
}

impl BatchItem {
    pub fn scored(result: ScoredResult) -> Self {
        BatchItem::Scored(ScoredItem { ok: true, result })
    }

    pub fn rejected(index: usize, tx_id: Option<String>, err: ValidationError) -> Self {
        BatchItem::Rejected(RejectedItem {
            ok: false,
            index,
            tx_id,
            error: ValidationError::KIND,
            fields: err.fields,
        })
    }

    pub fn result(&self) -> Option<&ScoredResult> {
        match self {
            BatchItem::Scored(item) => Some(&item.result),
            BatchItem::Rejected(_) => None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.result().is_some()
    }
}

/// Aggregate counts over one batch. Rejected items count toward `total`
/// only; `avg_risk` is the mean over scored items.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub high_risk: usize,
    pub medium_risk: usize,
    pub low_risk: usize,
    pub rejected: usize,
    #[serde(with = "rust_decimal::serde::float")]
    pub avg_risk: Decimal,
}

impl BatchSummary {
    pub fn from_items(items: &[BatchItem]) -> Self {
        let mut summary = BatchSummary {
            total: items.len(),
            high_risk: 0,
            medium_risk: 0,
            low_risk: 0,
            rejected: 0,
            avg_risk: Decimal::ZERO,
        };

        let mut score_sum = Decimal::ZERO;
        for item in items {
            match item.result() {
                Some(result) => {
                    score_sum += result.score;
                    match result.risk_bucket {
                        RiskBucket::High => summary.high_risk += 1,
                        RiskBucket::Medium => summary.medium_risk += 1,
                        RiskBucket::Low => summary.low_risk += 1,
                    }
                }
                None => summary.rejected += 1,
            }
        }

        let scored = summary.total - summary.rejected;
        if scored > 0 {
            summary.avg_risk = score_sum / Decimal::from(scored as u64);
        }
        summary
    }
}

/// Response body for a batch submission.
#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
    pub summary: BatchSummary,
    pub items: Vec<BatchItem>,
}
