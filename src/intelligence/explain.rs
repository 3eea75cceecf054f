use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use crate::models::RiskSignal;

/// Ordered record of which signals were evaluated for one transaction.
/// Stored in evaluation order; narrators sort it themselves.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExplanationTrail {
    pub tx_id: String,
    pub signals: Vec<RiskSignal>,
    pub recorded_at: DateTime<Utc>,
}

impl ExplanationTrail {
    /// Triggered signals, most significant first (weight descending). Ties
    /// keep evaluation order.
    pub fn ranked(&self) -> Vec<&RiskSignal> {
        let mut fired: Vec<&RiskSignal> = self.signals.iter().filter(|s| s.triggered).collect();
        fired.sort_by(|a, b| b.weight.cmp(&a.weight));
        fired
    }
}

/// In-process trail store keyed by `tx_id`, bounded to the most recently
/// recorded `capacity` transactions.
pub struct ExplainabilityRecorder {
    capacity: usize,
    inner: RwLock<TrailStore>,
}

#[derive(Default)]
struct TrailStore {
    trails: HashMap<String, ExplanationTrail>,
    order: VecDeque<String>,
}

impl ExplainabilityRecorder {
    pub const DEFAULT_CAPACITY: usize = 10_000;

    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: RwLock::new(TrailStore::default()),
        }
    }

    /// Store `signals` for `tx_id`, replacing any earlier trail for the same id.
    pub fn record(&self, tx_id: &str, signals: Vec<RiskSignal>) -> ExplanationTrail {
        let trail = ExplanationTrail {
            tx_id: tx_id.to_string(),
            signals,
            recorded_at: Utc::now(),
        };

        let mut store = self.inner.write();
        if store.trails.insert(tx_id.to_string(), trail.clone()).is_none() {
            store.order.push_back(tx_id.to_string());
        }
        while store.order.len() > self.capacity {
            if let Some(evicted) = store.order.pop_front() {
                store.trails.remove(&evicted);
            }
        }

        trail
    }

    pub fn get(&self, tx_id: &str) -> Option<ExplanationTrail> {
        self.inner.read().trails.get(tx_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().trails.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ExplainabilityRecorder {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}
