use async_trait::async_trait;
use pointsbot_core::notify::{DeliveryError, MessageSender};
use teloxide::prelude::*;
use teloxide::types::{ChatId, ParseMode};

/// Delivers notification texts as HTML messages, one attempt each.
#[derive(Clone)]
pub struct TelegramSender {
    bot: Bot,
}

impl TelegramSender {
    /// Wrap a bot handle.
    #[must_use]
    pub const fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl MessageSender for TelegramSender {
    async fn send_html(&self, chat_id: i64, text: String) -> Result<(), DeliveryError> {
        self.bot
            .send_message(ChatId(chat_id), text)
            .parse_mode(ParseMode::Html)
            .await
            .map(|_| ())
            .map_err(|e| DeliveryError::Send(e.to_string()))
    }
}
