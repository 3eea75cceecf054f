use std::sync::Arc;

use metrics::counter;
use rust_decimal::Decimal;

use super::registry::{BroadcastReport, SubscriptionRegistry};
use crate::models::{AlertEnvelope, ScoredResult};
use crate::services::notifier::{format_risk_alert, Notifier};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    Skip,
    Dispatch(BroadcastReport),
}

impl RouteDecision {
    pub fn is_dispatch(&self) -> bool {
        matches!(self, RouteDecision::Dispatch(_))
    }
}

/// Threshold gate between the scoring pipeline and subscriber fan-out.
///
/// Delivery problems stay inside the registry; routing itself cannot fail.
pub struct AlertRouter {
    registry: Arc<SubscriptionRegistry>,
    threshold: Decimal,
    notifier: Option<Arc<Notifier>>,
}

impl AlertRouter {
    pub const DEFAULT_THRESHOLD: Decimal = Decimal::from_parts(75, 0, 0, false, 2);

    pub fn new(registry: Arc<SubscriptionRegistry>, threshold: Decimal) -> Self {
        Self {
            registry,
            threshold,
            notifier: None,
        }
    }

    pub fn with_notifier(mut self, notifier: Option<Arc<Notifier>>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn route(&self, result: &ScoredResult) -> RouteDecision {
        self.route_with_threshold(result, self.threshold)
    }

    /// Dispatch iff `result.score >= threshold`.
    pub fn route_with_threshold(&self, result: &ScoredResult, threshold: Decimal) -> RouteDecision {
        if !should_dispatch(result.score, threshold) {
            return RouteDecision::Skip;
        }

        let report = self.registry.broadcast(AlertEnvelope::tx(result.clone()));
        if report.seq.is_none() {
            tracing::debug!(tx_id = %result.tx.tx_id, "Alert suppressed as duplicate");
            return RouteDecision::Dispatch(report);
        }
        counter!("alerts_dispatched_total").increment(1);

        tracing::info!(
            tx_id = %result.tx.tx_id,
            score = %result.score,
            flags = ?result.flags,
            delivered = report.delivered,
            "High-risk alert dispatched"
        );

        if let Some(notifier) = &self.notifier {
            let notifier = notifier.clone();
            let msg = format_risk_alert(result);
            tokio::spawn(async move {
                notifier.send(&msg).await;
            });
        }

        RouteDecision::Dispatch(report)
    }
}

pub fn should_dispatch(score: Decimal, threshold: Decimal) -> bool {
    score >= threshold
}
