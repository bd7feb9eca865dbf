/*!
Mock chat transport

Records every delivered message with the instant it was sent, so tests can assert
on ordering and throttling without a Telegram token. Failures are injected per chat.
*/

use async_trait::async_trait;
use imsa_core::{ChatTransport, DeliveryError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct SentMessage {
    pub chat_id: i64,
    pub text: String,
    pub at: Instant,
}

/// Injected outcome for a chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// Behaves like a user who blocked the bot.
    Unreachable,
    Transport,
}

#[derive(Clone, Default)]
pub struct MockTransport {
    sent: Arc<Mutex<Vec<SentMessage>>>,
    attempts: Arc<Mutex<Vec<(i64, Instant)>>>,
    failures: Arc<Mutex<HashMap<i64, Failure>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(&self, chat_id: i64, failure: Failure) {
        self.failures.lock().insert(chat_id, failure);
    }

    /// Successfully delivered messages, in send order.
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().clone()
    }

    pub fn recipients(&self) -> Vec<i64> {
        self.sent.lock().iter().map(|m| m.chat_id).collect()
    }

    /// Every send attempt, failed ones included.
    pub fn attempts(&self) -> Vec<(i64, Instant)> {
        self.attempts.lock().clone()
    }
}

#[async_trait]
impl ChatTransport for MockTransport {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), DeliveryError> {
        let now = Instant::now();
        self.attempts.lock().push((chat_id, now));

        let failure = self.failures.lock().get(&chat_id).copied();
        match failure {
            Some(Failure::Unreachable) => {
                Err(DeliveryError::Unreachable("Forbidden: bot was blocked by the user".into()))
            }
            Some(Failure::Transport) => Err(DeliveryError::Transport("connection reset".into())),
            None => {
                self.sent.lock().push(SentMessage { chat_id, text: text.to_string(), at: now });
                tracing::debug!("[mock] delivered to {}: {} bytes", chat_id, text.len());
                Ok(())
            }
        }
    }
}
