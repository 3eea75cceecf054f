use rust_decimal::Decimal;

use super::features::FeatureSet;
use crate::config::WeightTable;
use crate::models::{Flag, RiskSignal};

/// Combines triggered signals into a single score in [0, 1].
#[derive(Debug, Clone)]
pub struct RiskScorer {
    weights: WeightTable,
}

impl RiskScorer {
    pub fn new(weights: WeightTable) -> Self {
        Self { weights }
    }

    /// Weighted sum of triggered signals, clamped to [0, 1].
    ///
    /// The sum may exceed 1.0 before clamping, so several simultaneous
    /// signals saturate risk instead of averaging it down. Every evaluated
    /// signal is returned, triggered or not, in evaluation order; a degraded
    /// profile read appends a zero-weight `profile_unavailable` signal.
    pub fn score(&self, features: &FeatureSet) -> (Decimal, Vec<RiskSignal>) {
        let mut signals: Vec<RiskSignal> = features
            .features
            .iter()
            .map(|f| RiskSignal {
                name: f.flag,
                weight: self.weights.weight(f.flag),
                triggered: f.triggered,
                detail: f.detail.clone(),
            })
            .collect();

        if !features.profile_available {
            signals.push(RiskSignal {
                name: Flag::ProfileUnavailable,
                weight: self.weights.weight(Flag::ProfileUnavailable),
                triggered: true,
                detail: "wallet profile unavailable, scored with fallback profile".into(),
            });
        }

        (clamp_score(raw_score(&signals)), signals)
    }
}

/// Sum of weights of triggered signals, in evaluation order.
pub fn raw_score(signals: &[RiskSignal]) -> Decimal {
    signals
        .iter()
        .filter(|s| s.triggered)
        .map(|s| s.weight)
        .sum()
}

pub fn clamp_score(raw: Decimal) -> Decimal {
    raw.clamp(Decimal::ZERO, Decimal::ONE)
}

/// Names of triggered signals, preserving evaluation order.
pub fn triggered_flags(signals: &[RiskSignal]) -> Vec<Flag> {
    signals.iter().filter(|s| s.triggered).map(|s| s.name).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
