//! Telegram Bot API client used for alert delivery.

use std::time::Duration;

use serde::Serialize;
use tracing::info;

use super::{MessageSink, error_body, truncate};
use crate::error::SinkError;

pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Bot credentials, loaded once at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotConfig {
    pub token: String,
    pub chat_id: String,
    pub api_url: String,
}

impl BotConfig {
    pub fn new(token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self { token: token.into(), chat_id: chat_id.into(), api_url: DEFAULT_API_URL.to_string() }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
}

/// Telegram client. Without a [`BotConfig`] every send fails with `NotInitialized`.
pub struct TelegramClient {
    config: Option<BotConfig>,
    client: reqwest::Client,
}

impl TelegramClient {
    pub fn new(config: BotConfig) -> Result<Self, SinkError> {
        info!(
            "Telegram bot initialized with token {} and chat ID {}",
            mask_token(&config.token),
            config.chat_id
        );
        Ok(Self { config: Some(config), client: Self::http_client()? })
    }

    #[cfg(test)]
    pub fn uninitialized() -> Result<Self, SinkError> {
        Ok(Self { config: None, client: Self::http_client()? })
    }

    #[cfg(test)]
    pub fn is_initialized(&self) -> bool {
        self.config.is_some()
    }

    fn http_client() -> Result<reqwest::Client, SinkError> {
        Ok(reqwest::Client::builder().timeout(Duration::from_secs(10)).build()?)
    }
}

#[async_trait::async_trait]
impl MessageSink for TelegramClient {
    async fn send(&self, text: &str) -> Result<(), SinkError> {
        let config = self.config.as_ref().ok_or(SinkError::NotInitialized("telegram bot"))?;

        let url =
            format!("{}/bot{}/sendMessage", config.api_url.trim_end_matches('/'), config.token);
        let payload = SendMessage { chat_id: &config.chat_id, text, parse_mode: "HTML" };

        let response = self.client.post(url).json(&payload).send().await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(SinkError::Rejected {
                status: status.as_u16(),
                body: error_body(response, 512).await,
            });
        }

        info!("Telegram message sent successfully: {}...", truncate(text, 30));
        Ok(())
    }
}

/// Keep the first 8 and last 4 characters of a token longer than 10 characters.
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 10 {
        return token.to_string();
    }
    let head: String = chars[..8].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}
