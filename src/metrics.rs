use std::sync::OnceLock;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus exporter and register all application metrics.
/// Returns a `PrometheusHandle` whose `render()` method produces the
/// text/plain Prometheus scrape payload.
///
/// The global recorder can only be installed once per process; later calls
/// return the same handle.
pub fn init_metrics() -> PrometheusHandle {
    HANDLE.get_or_init(install).clone()
}

fn install() -> PrometheusHandle {
    let handle = match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => handle,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to install Prometheus recorder, metrics will not be exported");
            PrometheusBuilder::new().build_recorder().handle()
        }
    };

    // Pre-register counters so they appear even before the first increment.
    counter!("transactions_scored_total").absolute(0);
    counter!("validation_errors_total").absolute(0);
    counter!("degraded_scoring_total").absolute(0);
    counter!("alerts_dispatched_total").absolute(0);
    counter!("alerts_dropped_total").absolute(0);
    counter!("connections_timed_out_total").absolute(0);
    counter!("batches_processed_total").absolute(0);

    gauge!("ws_connections").set(0.0);

    // Histograms are lazily created on first record; force creation.
    histogram!("scoring_latency_seconds").record(0.0);
    histogram!("batch_latency_seconds").record(0.0);

    handle
}
