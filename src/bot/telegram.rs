//! Outbound Telegram calls.

use async_trait::async_trait;
use teloxide::prelude::*;
use tracing::{info, warn};

/// Where replies go. Implemented by [`TelegramClient`]; tests record instead.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<(), String>;
}

/// Telegram API client.
pub struct TelegramClient {
    bot: Bot,
}

impl TelegramClient {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    /// The bot's own username, used to match `/command@username`.
    pub async fn bot_username(&self) -> Result<String, String> {
        let me = self.bot.get_me().await.map_err(|e| {
            let msg = format!("Failed to get bot info: {e}");
            warn!("{}", msg);
            msg
        })?;
        Ok(me.user.username.clone().unwrap_or_default())
    }

    /// Point Telegram at `url`, dropping anything queued meanwhile.
    pub async fn register_webhook(&self, url: &str, secret: &str) -> Result<(), String> {
        let url = reqwest::Url::parse(url).map_err(|e| format!("Invalid webhook URL '{url}': {e}"))?;
        info!("Registering webhook at {}", url);
        self.bot
            .set_webhook(url)
            .secret_token(secret.to_string())
            .drop_pending_updates(true)
            .await
            .map(|_| ())
            .map_err(|e| {
                let msg = format!("Failed to set webhook: {e}");
                warn!("{}", msg);
                msg
            })
    }
}

#[async_trait]
impl Messenger for TelegramClient {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<(), String> {
        self.bot
            .send_message(chat_id, text)
            .await
            .map(|_| ())
            .map_err(|e| {
                let msg = format!("Failed to send: {e}");
                warn!("{}", msg);
                msg
            })
    }
}
