//! 通知发送抽象 Trait

use async_trait::async_trait;

use crate::error::CoreResult;

/// Delivers plain-text messages to a chat.
///
/// 平台实现:
/// - Telegram: `TelegramNotifier` (`sendMessage`)
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, chat_id: i64, text: &str) -> CoreResult<()>;
}
