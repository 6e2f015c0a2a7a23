use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Delivers one formatted message to one subscriber.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, subscriber_id: i64, text: &str) -> Result<()>;
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
    parse_mode: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Deserialize)]
struct TelegramResponse {
    ok: bool,
    description: Option<String>,
}

/// Telegram Bot API transport (`sendMessage` with HTML parse mode).
pub struct TelegramNotifier {
    client: Client,
    api_base_url: String,
    bot_token: String,
}

impl TelegramNotifier {
    pub fn new(api_base_url: &str, bot_token: &str) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            bot_token: bot_token.to_string(),
        })
    }

    fn send_message_url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base_url, self.bot_token)
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, subscriber_id: i64, text: &str) -> Result<()> {
        let request = SendMessageRequest {
            chat_id: subscriber_id,
            text,
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };

        let response = self
            .client
            .post(self.send_message_url())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(AppError::Transport(format!("Telegram API error: {}", error_text)));
        }

        let telegram_response: TelegramResponse = response.json().await?;
        if !telegram_response.ok {
            return Err(AppError::Transport(
                telegram_response
                    .description
                    .unwrap_or_else(|| "Unknown Telegram API error".to_string()),
            ));
        }

        Ok(())
    }
}
