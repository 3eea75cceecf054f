pub mod scoring;

pub use scoring::{MemoDenylist, QuietWindow, ScoringConfig, WeightTable};

use rust_decimal::Decimal;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::alerts::registry::RegistryConfig;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Postgres connection string. Unset → in-memory store.
    pub database_url: Option<String>,
    /// Bearer token for `/api/*` and `/ws`. Unset → auth disabled (dev mode).
    pub api_token: Option<String>,

    // Scoring pipeline
    pub alert_threshold: Decimal,
    pub batch_concurrency: usize,
    pub profile_timeout: Duration,

    // Real-time channel
    pub ws_queue_capacity: usize,
    pub ws_heartbeat_interval: Duration,
    pub ws_missed_heartbeats: u32,
    pub ws_replay_capacity: usize,

    // Notifications (optional)
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,

    pub log_json: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            database_url: None,
            api_token: None,
            alert_threshold: Decimal::new(75, 2),
            batch_concurrency: default_concurrency(),
            profile_timeout: Duration::from_millis(500),
            ws_queue_capacity: 256,
            ws_heartbeat_interval: Duration::from_secs(30),
            ws_missed_heartbeats: 2,
            ws_replay_capacity: 512,
            telegram_bot_token: None,
            telegram_chat_id: None,
            log_json: false,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let alert_threshold: Decimal = parse_env("ALERT_THRESHOLD", defaults.alert_threshold)?;
        if alert_threshold < Decimal::ZERO || alert_threshold > Decimal::ONE {
            anyhow::bail!("ALERT_THRESHOLD must be within [0, 1], got {alert_threshold}");
        }

        Ok(Self {
            host: env::var("HOST").unwrap_or(defaults.host),
            port: parse_env("PORT", defaults.port)?,
            database_url: non_empty_env("DATABASE_URL"),
            api_token: non_empty_env("API_TOKEN"),

            alert_threshold,
            batch_concurrency: parse_env("BATCH_CONCURRENCY", defaults.batch_concurrency)?.max(1),
            profile_timeout: Duration::from_millis(parse_env("PROFILE_TIMEOUT_MS", 500u64)?),

            ws_queue_capacity: parse_env("WS_QUEUE_CAPACITY", defaults.ws_queue_capacity)?.max(1),
            ws_heartbeat_interval: Duration::from_secs(parse_env("WS_HEARTBEAT_INTERVAL_SECS", 30u64)?.max(1)),
            ws_missed_heartbeats: parse_env("WS_MISSED_HEARTBEATS", defaults.ws_missed_heartbeats)?.max(1),
            ws_replay_capacity: parse_env("WS_REPLAY_CAPACITY", defaults.ws_replay_capacity)?,

            telegram_bot_token: non_empty_env("TELEGRAM_BOT_TOKEN"),
            telegram_chat_id: non_empty_env("TELEGRAM_CHAT_ID"),

            log_json: env::var("LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        })
    }

    /// Returns true if both Telegram settings are configured.
    pub fn has_telegram(&self) -> bool {
        self.telegram_bot_token.is_some() && self.telegram_chat_id.is_some()
    }

    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            queue_capacity: self.ws_queue_capacity,
            heartbeat_interval: self.ws_heartbeat_interval,
            missed_heartbeats: self.ws_missed_heartbeats,
            replay_capacity: self.ws_replay_capacity,
        }
    }
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

pub(crate) fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse `key` if set, otherwise return `default`. A set-but-invalid value is
/// a startup error rather than a silent fallback.
pub(crate) fn parse_env<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match non_empty_env(key) {
        Some(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid {key}={raw}: {e}")),
        None => Ok(default),
    }
}
