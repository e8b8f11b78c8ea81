//! Telegram admin bot: long-polling, command dispatch and notifications.

mod client;
mod commands;
mod dispatcher;
mod notifier;
mod render;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use dns_failover_app::AppState;
use tokio::task::JoinSet;

pub use client::TelegramClient;
pub use notifier::TelegramNotifier;

use client::TelegramError;
use dispatcher::Dispatcher;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Poll `getUpdates` until `shutdown` resolves. Each update is handled on
/// its own task so a long check never stalls the poll loop.
pub async fn run<F>(
    client: Arc<TelegramClient>,
    state: Arc<AppState>,
    poll_timeout: Duration,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()>,
{
    let me = client
        .get_me()
        .await
        .context("Telegram getMe failed, check telegram.token and telegram.api_endpoint")?;
    let username = me.username.unwrap_or_default();
    tracing::info!(bot = %username, "Telegram bot connected");

    if let Err(e) = client.set_my_commands(&commands::menu()).await {
        tracing::warn!("Failed to register bot commands: {e}");
    }

    let dispatcher = Arc::new(Dispatcher::new(client.clone(), state, username));
    let mut tasks = JoinSet::new();
    let mut offset = 0;
    let mut backoff = INITIAL_BACKOFF;
    tokio::pin!(shutdown);

    loop {
        while tasks.try_join_next().is_some() {}

        let polled = tokio::select! {
            () = &mut shutdown => break,
            polled = client.get_updates(offset, poll_timeout) => polled,
        };

        match polled {
            Ok(updates) => {
                backoff = INITIAL_BACKOFF;
                for update in updates {
                    offset = offset.max(update.update_id + 1);
                    let dispatcher = dispatcher.clone();
                    tasks.spawn(async move { dispatcher.handle(update).await });
                }
            }
            Err(e) => {
                let wait = match &e {
                    TelegramError::Api {
                        retry_after: Some(secs),
                        ..
                    } => Duration::from_secs(*secs),
                    _ => backoff,
                };
                tracing::warn!("getUpdates failed, retrying in {}s: {e}", wait.as_secs());
                backoff = (backoff * 2).min(MAX_BACKOFF);
                tokio::select! {
                    () = &mut shutdown => break,
                    () = tokio::time::sleep(wait) => {}
                }
            }
        }
    }

    if !tasks.is_empty() {
        tracing::info!("Abandoning {} in-flight commands", tasks.len());
    }
    tasks.shutdown().await;
    tracing::info!("Telegram bot stopped");
    Ok(())
}
