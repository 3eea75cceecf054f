use std::sync::Arc;

use txrisk::api::router::create_router;
use txrisk::config::{AppConfig, ScoringConfig};
use txrisk::db::{self, MemoryStore, PgStore, RiskStore};
use txrisk::services::notifier::Notifier;
use txrisk::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()?;
    init_tracing(config.log_json);

    let scoring = Arc::new(ScoringConfig::from_env()?);
    let addr = format!("{}:{}", config.host, config.port);

    tracing::info!(
        threshold = %config.alert_threshold,
        batch_concurrency = config.batch_concurrency,
        denylist = ?scoring.memo_denylist.patterns(),
        "Scoring configuration loaded"
    );

    // --- Persistence ---
    let store: Arc<dyn RiskStore> = match &config.database_url {
        Some(url) => {
            tracing::info!("Connecting to database...");
            let pool = db::init_pool(url).await?;
            tracing::info!("Database connected, migrations applied");
            Arc::new(PgStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store, results are not durable");
            Arc::new(MemoryStore::new())
        }
    };

    // --- Notifications ---
    let notifier = if config.has_telegram() {
        tracing::info!("Telegram notifications enabled");
        config
            .telegram_bot_token
            .clone()
            .zip(config.telegram_chat_id.clone())
            .map(|(token, chat_id)| Arc::new(Notifier::new(token, chat_id)))
    } else {
        None
    };

    let state = AppState::new(config, scoring, store, notifier);

    // --- Real-time channel heartbeat ---
    let _monitor = state.registry.spawn_heartbeat_monitor();
    tracing::info!(
        interval_secs = state.config.ws_heartbeat_interval.as_secs(),
        missed = state.config.ws_missed_heartbeats,
        "Heartbeat monitor spawned"
    );

    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {addr}");
    axum::serve(listener, router).await?;

    Ok(())
}

fn init_tracing(json: bool) {
    use tracing_subscriber::{fmt, EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}
