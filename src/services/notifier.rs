use serde_json::json;

use crate::models::ScoredResult;

/// Telegram notification service. Failures are logged but never block the main flow.
#[derive(Debug, Clone)]
pub struct Notifier {
    http: reqwest::Client,
    bot_token: String,
    chat_id: String,
}

impl Notifier {
    pub fn new(bot_token: String, chat_id: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            bot_token,
            chat_id,
        }
    }

    /// Send a Telegram message. Failures are logged as warnings.
    pub async fn send(&self, message: &str) {
        let url = format!(
            "https://api.telegram.org/bot{}/sendMessage",
            self.bot_token
        );

        let body = json!({
            "chat_id": self.chat_id,
            "text": message,
            "parse_mode": "Markdown",
        });

        match self.http.post(&url).json(&body).send().await {
            Ok(resp) => {
                if !resp.status().is_success() {
                    tracing::warn!(
                        status = %resp.status(),
                        "Telegram sendMessage returned non-2xx"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to send Telegram notification");
            }
        }
    }
}

fn short_addr(addr: &str) -> String {
    let chars: Vec<char> = addr.chars().collect();
    if chars.len() > 10 {
        let head: String = chars[..6].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}...{tail}")
    } else {
        addr.to_string()
    }
}

/// Format a high-risk transaction alert.
pub fn format_risk_alert(result: &ScoredResult) -> String {
    let flags = if result.flags.is_empty() {
        "none".to_string()
    } else {
        result
            .flags
            .iter()
            .map(|f| f.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };

    format!(
        "*High-Risk Transaction*\nTx: `{}`\nChain: {}\nFrom: `{}`\nTo: `{}`\nAmount: {} {}\nScore: {} ({})\nCategory: {}\nFlags: {}",
        result.tx.tx_id,
        result.tx.chain,
        short_addr(&result.tx.from_addr),
        short_addr(&result.tx.to_addr),
        result.tx.amount.normalize(),
        result.tx.symbol,
        result.score.round_dp(2),
        result.risk_bucket,
        result.category,
        flags,
    )
}
