// src/publish.rs
//! Outward publication boundary. The pipeline hands one formatted string to a
//! `Publisher`; transport failures surface as errors and are terminal for the
//! cycle — publication itself is never retried automatically.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::info;

#[async_trait::async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, channel: &str, text: &str) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Telegram Bot API publisher. Requires `TELEGRAM_BOT_TOKEN`; the bot must be
/// an admin of the target channel.
pub struct TelegramPublisher {
    http: reqwest::Client,
    bot_token: String,
}

#[derive(Deserialize)]
struct BotApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

impl TelegramPublisher {
    pub fn from_env() -> Self {
        let bot_token = std::env::var("TELEGRAM_BOT_TOKEN").unwrap_or_default();
        let http = reqwest::Client::builder()
            .user_agent("digest-curator/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(20))
            .build()
            .expect("reqwest client");
        Self { http, bot_token }
    }
}

#[async_trait::async_trait]
impl Publisher for TelegramPublisher {
    async fn publish(&self, channel: &str, text: &str) -> Result<()> {
        if self.bot_token.is_empty() {
            bail!("TELEGRAM_BOT_TOKEN is not set");
        }
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.bot_token);
        let resp = self
            .http
            .post(&url)
            .json(&serde_json::json!({
                "chat_id": channel,
                "text": text,
                "disable_web_page_preview": true,
            }))
            .send()
            .await
            .context("sendMessage request failed")?;
        let status = resp.status();
        let body: BotApiResponse = resp
            .json()
            .await
            .with_context(|| format!("malformed Bot API response (status {status})"))?;
        if !body.ok {
            bail!(
                "sendMessage rejected: {}",
                body.description.unwrap_or_else(|| status.to_string())
            );
        }
        info!(channel, chars = text.chars().count(), "message published");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "telegram"
    }
}
