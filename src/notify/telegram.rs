//! Telegram Bot API notifier.

use super::{render, DeliveryResult, Notifier, NotifyError};
use crate::config::TelegramConfig;
use crate::monitor::AlertEvent;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

/// Envelope of every Bot API response.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    description: Option<String>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct BotUser {
    username: Option<String>,
}

/// Sends alerts to a Telegram chat through a bot.
#[derive(Clone)]
pub struct TelegramNotifier {
    client: reqwest::Client,
    api_url: String,
    bot_token: String,
    chat_id: String,
    target: String,
}

impl TelegramNotifier {
    pub fn new(config: &TelegramConfig, target: &str, timeout: Duration) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            bot_token: config.bot_token.clone(),
            chat_id: config.chat_id.clone(),
            target: target.to_string(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_url, self.bot_token, method)
    }

    /// Unwrap a Bot API response, turning `ok: false` into an error.
    async fn read_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<Option<T>, NotifyError> {
        let status = response.status();
        match response.json::<ApiResponse<T>>().await {
            Ok(body) if status.is_success() && body.ok => Ok(body.result),
            Ok(body) => Err(NotifyError::Telegram(
                body.description.unwrap_or_else(|| status.to_string()),
            )),
            Err(e) if status.is_success() => Err(e.into()),
            Err(_) => Err(NotifyError::Telegram(status.to_string())),
        }
    }

    /// Send an HTML-formatted message to the configured chat.
    pub async fn send_text(&self, text: &str) -> DeliveryResult {
        let payload = serde_json::json!({
            "chat_id": self.chat_id,
            "text": text,
            "parse_mode": "HTML",
        });

        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&payload)
            .send()
            .await?;

        Self::read_response::<serde_json::Value>(response).await?;
        Ok(())
    }

    /// Check the bot token with `getMe` and return the bot's username.
    pub async fn verify(&self) -> Result<String, NotifyError> {
        let response = self.client.get(self.method_url("getMe")).send().await?;
        let user = Self::read_response::<BotUser>(response).await?;
        Ok(user
            .and_then(|u| u.username)
            .unwrap_or_else(|| "unknown".to_string()))
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn deliver(&self, event: &AlertEvent) -> DeliveryResult {
        let text = render::telegram_text(&self.target, event);
        self.send_text(&text).await.map_err(|e| {
            if let NotifyError::Telegram(msg) = &e {
                if msg.to_lowercase().contains("chat not found") {
                    tracing::warn!("Telegram: chat {} not found; send /start to the bot first", self.chat_id);
                }
            }
            e
        })
    }
}
