use async_trait::async_trait;
use imsa_core::{ChatTransport, DeliveryError};
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use teloxide::{ApiError, RequestError};

/// Outbound Telegram messages in HTML parse mode.
#[derive(Clone)]
pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

/// Recipient-side failures are `Unreachable`, everything else is a transport fault.
pub fn classify(e: RequestError) -> DeliveryError {
    match e {
        RequestError::Api(
            api @ (ApiError::BotBlocked
            | ApiError::BotKicked
            | ApiError::UserDeactivated
            | ApiError::ChatNotFound
            | ApiError::CantInitiateConversation),
        ) => DeliveryError::Unreachable(api.to_string()),
        other => DeliveryError::Transport(other.to_string()),
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), DeliveryError> {
        self.bot
            .send_message(ChatId(chat_id), text)
            .parse_mode(ParseMode::Html)
            .await
            .map(|_| ())
            .map_err(classify)
    }
}
