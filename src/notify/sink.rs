use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::info;

use super::Notification;

const TELEGRAM_API: &str = "https://api.telegram.org";
const SEND_TIMEOUT: Duration = Duration::from_secs(8);

/// Delivery side of the bot. Callers log failures and move on.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn deliver(&self, notification: &Notification) -> Result<()>;
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

pub struct TelegramSink {
    client: Client,
    base_url: String,
    chat_id: String,
}

impl TelegramSink {
    pub fn new(bot_token: &str, chat_id: &str) -> Result<Self> {
        Self::with_base_url(TELEGRAM_API, bot_token, chat_id)
    }

    pub fn with_base_url(api: &str, bot_token: &str, chat_id: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .context("Failed to build Telegram HTTP client")?;

        Ok(Self {
            client,
            base_url: format!("{}/bot{}", api.trim_end_matches('/'), bot_token),
            chat_id: chat_id.to_string(),
        })
    }
}

#[async_trait]
impl AlertSink for TelegramSink {
    async fn deliver(&self, notification: &Notification) -> Result<()> {
        let body = SendMessage {
            chat_id: &self.chat_id,
            text: &notification.text,
        };

        let resp = self
            .client
            .post(format!("{}/sendMessage", self.base_url))
            .json(&body)
            .send()
            .await
            .context("Failed to send Telegram message")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Telegram API error {}: {}", status, body);
        }

        Ok(())
    }
}

/// Dry-run sink: writes each notification to the log instead of sending it.
#[derive(Debug, Default)]
pub struct LogSink;

#[async_trait]
impl AlertSink for LogSink {
    async fn deliver(&self, notification: &Notification) -> Result<()> {
        info!(
            "[{}] {}: {}",
            notification.kind,
            notification.instrument.as_deref().unwrap_or("-"),
            notification.text
        );
        Ok(())
    }
}
