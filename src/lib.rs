pub mod alerts;
pub mod api;
pub mod config;
pub mod db;
pub mod errors;
pub mod metrics;
pub mod models;
pub mod ingestion;
pub mod intelligence;
pub mod services;

use std::sync::Arc;

use crate::alerts::{AlertRouter, SubscriptionRegistry};
use crate::config::{AppConfig, ScoringConfig};
use crate::db::RiskStore;
use crate::ingestion::{BatchCoordinator, RiskEngine};
use crate::intelligence::ExplainabilityRecorder;
use crate::services::notifier::Notifier;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub engine: Arc<RiskEngine>,
    pub batch: Arc<BatchCoordinator>,
    pub registry: Arc<SubscriptionRegistry>,
    pub store: Arc<dyn RiskStore>,
    pub metrics_handle: metrics_exporter_prometheus::PrometheusHandle,
}

impl AppState {
    /// Wire the pipeline, registry and store together.
    pub fn new(
        config: AppConfig,
        scoring: Arc<ScoringConfig>,
        store: Arc<dyn RiskStore>,
        notifier: Option<Arc<Notifier>>,
    ) -> Self {
        let registry = Arc::new(SubscriptionRegistry::new(config.registry_config()));
        let router = AlertRouter::new(registry.clone(), config.alert_threshold).with_notifier(notifier);
        let engine = Arc::new(RiskEngine::new(
            scoring,
            store.clone(),
            router,
            Arc::new(ExplainabilityRecorder::default()),
            config.profile_timeout,
        ));
        let batch = Arc::new(BatchCoordinator::new(engine.clone(), config.batch_concurrency));

        Self {
            config,
            engine,
            batch,
            registry,
            store,
            metrics_handle: crate::metrics::init_metrics(),
        }
    }
}
