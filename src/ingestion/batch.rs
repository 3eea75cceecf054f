use std::sync::Arc;
use std::time::Instant;

use futures_util::stream::{self, StreamExt};
use metrics::{counter, histogram};
use serde_json::Value;

use super::pipeline::RiskEngine;
use crate::models::{BatchItem, BatchOutcome, BatchSummary, RawTransaction};

/// Runs a batch through the pipeline with bounded parallelism.
///
/// Items may finish out of order; the outcome is re-sorted by input index.
/// A rejected item never aborts the rest of the batch.
pub struct BatchCoordinator {
    engine: Arc<RiskEngine>,
    concurrency: usize,
}

impl BatchCoordinator {
    pub fn new(engine: Arc<RiskEngine>, concurrency: usize) -> Self {
        Self {
            engine,
            concurrency: concurrency.max(1),
        }
    }

    pub async fn process_batch(&self, transactions: Vec<Value>) -> BatchOutcome {
        let start = Instant::now();
        let total = transactions.len();

        let mut indexed: Vec<(usize, BatchItem)> = stream::iter(transactions.into_iter().enumerate())
            .map(|(index, value)| {
                let engine = self.engine.clone();
                async move { (index, score_item(&engine, index, value).await) }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        indexed.sort_by_key(|(index, _)| *index);
        let items: Vec<BatchItem> = indexed.into_iter().map(|(_, item)| item).collect();
        let summary = BatchSummary::from_items(&items);

        counter!("batches_processed_total").increment(1);
        histogram!("batch_latency_seconds").record(start.elapsed().as_secs_f64());
        tracing::info!(
            total,
            high_risk = summary.high_risk,
            medium_risk = summary.medium_risk,
            low_risk = summary.low_risk,
            rejected = summary.rejected,
            avg_risk = %summary.avg_risk,
            "Batch processed"
        );

        BatchOutcome { summary, items }
    }
}

async fn score_item(engine: &RiskEngine, index: usize, value: Value) -> BatchItem {
    let hint = value
        .get("tx_id")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string);

    let raw = match RawTransaction::from_value(value) {
        Ok(raw) => raw,
        Err(e) => {
            counter!("validation_errors_total").increment(1);
            return BatchItem::rejected(index, hint, e);
        }
    };

    match engine.process(raw).await {
        Ok(result) => BatchItem::scored(result),
        Err(e) => BatchItem::rejected(index, hint, e),
    }
}
