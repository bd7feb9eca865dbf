use async_trait::async_trait;

/// Why an outbound message did not arrive.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// Recipient blocked the bot, deleted their account or the chat is gone.
    #[error("recipient unreachable: {0}")]
    Unreachable(String),
    #[error("transport failure: {0}")]
    Transport(String),
}

/// Outbound side of the chat platform, as seen by the fan-out.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), DeliveryError>;
}
