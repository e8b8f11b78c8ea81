//! `NotificationSink` over `sendMessage`.

use std::sync::Arc;

use async_trait::async_trait;
use dns_failover_core::{CoreError, CoreResult, NotificationSink};

use super::client::TelegramClient;

pub struct TelegramNotifier {
    client: Arc<TelegramClient>,
}

impl TelegramNotifier {
    pub fn new(client: Arc<TelegramClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl NotificationSink for TelegramNotifier {
    async fn send(&self, chat_id: i64, text: &str) -> CoreResult<()> {
        self.client
            .send_message(chat_id, text)
            .await
            .map(|_| ())
            .map_err(|e| CoreError::NotificationError(format!("chat {chat_id}: {e}")))
    }
}
