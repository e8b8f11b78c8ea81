//! Telegram Bot API 客户端
//!
//! Every call is `POST {endpoint}/bot{token}/{method}` with a JSON body.

use std::time::Duration;

use dns_failover_provider::{HttpClientOptions, ProviderError, create_http_client};
use reqwest::Client;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Hard limit of one `sendMessage` text, in UTF-16 units; counted here in chars.
pub const MESSAGE_LIMIT: usize = 4096;
/// Slack on top of the long-poll timeout before the HTTP request gives up.
const POLL_SLACK: Duration = Duration::from_secs(15);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum TelegramError {
    #[error("Telegram HTTP client error: {0}")]
    Client(#[from] ProviderError),

    /// Transport failure. The URL is stripped so the token never reaches logs.
    #[error("Telegram request failed: {0}")]
    Http(reqwest::Error),

    #[error("Telegram API error {code}: {description}")]
    Api {
        code: i64,
        description: String,
        retry_after: Option<u64>,
    },
}

impl From<reqwest::Error> for TelegramError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.without_url())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

/// Entry for `setMyCommands`.
#[derive(Debug, Clone, Serialize)]
pub struct BotCommand {
    pub command: String,
    pub description: String,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    error_code: Option<i64>,
    #[serde(default)]
    parameters: Option<ResponseParameters>,
}

impl<T> ApiResponse<T> {
    fn into_result(self) -> Result<T, TelegramError> {
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            (ok, _) => Err(TelegramError::Api {
                code: self.error_code.unwrap_or_default(),
                description: self.description.unwrap_or_else(|| {
                    if ok {
                        "response without result".to_string()
                    } else {
                        "unknown error".to_string()
                    }
                }),
                retry_after: self.parameters.and_then(|p| p.retry_after),
            }),
        }
    }
}

#[derive(Serialize)]
struct GetUpdates<'a> {
    offset: i64,
    timeout: u64,
    allowed_updates: &'a [&'a str],
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Serialize)]
struct EditMessageText<'a> {
    chat_id: i64,
    message_id: i64,
    text: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Serialize)]
struct SetMyCommands<'a> {
    commands: &'a [BotCommand],
}

#[derive(Serialize)]
struct NoParams {}

pub struct TelegramClient {
    client: Client,
    base: String,
}

impl TelegramClient {
    /// `poll_timeout` is the `getUpdates` long-poll wait; the HTTP timeout is
    /// set a little above it.
    pub fn new(
        api_endpoint: &str,
        token: &str,
        proxy: Option<String>,
        poll_timeout: Duration,
    ) -> Result<Self, TelegramError> {
        let options = HttpClientOptions {
            connect_timeout: CONNECT_TIMEOUT,
            request_timeout: Some(poll_timeout + POLL_SLACK),
            proxy,
        };
        Ok(Self {
            client: create_http_client(&options)?,
            base: format!("{}/bot{token}", api_endpoint.trim_end_matches('/')),
        })
    }

    async fn call<P, R>(&self, method: &str, params: &P) -> Result<R, TelegramError>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        tracing::debug!("[telegram] {method}");
        let response = self
            .client
            .post(format!("{}/{method}", self.base))
            .json(params)
            .send()
            .await?;
        // Telegram answers errors with a JSON body and a 4xx status; decode both the same way
        let body: ApiResponse<R> = response.json().await?;
        body.into_result()
    }

    pub async fn get_me(&self) -> Result<User, TelegramError> {
        self.call("getMe", &NoParams {}).await
    }

    /// Long-poll for message updates at or after `offset`.
    pub async fn get_updates(
        &self,
        offset: i64,
        timeout: Duration,
    ) -> Result<Vec<Update>, TelegramError> {
        self.call(
            "getUpdates",
            &GetUpdates {
                offset,
                timeout: timeout.as_secs(),
                allowed_updates: &["message"],
            },
        )
        .await
    }

    /// Send plain text. Texts over [`MESSAGE_LIMIT`] go out as several
    /// messages; the last one is returned.
    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<Message, TelegramError> {
        let mut chunks = split_message(text, MESSAGE_LIMIT).into_iter().peekable();
        loop {
            let chunk = chunks.next().unwrap_or_default();
            let message: Message = self
                .call(
                    "sendMessage",
                    &SendMessage {
                        chat_id,
                        text: &chunk,
                        disable_web_page_preview: true,
                    },
                )
                .await?;
            if chunks.peek().is_none() {
                return Ok(message);
            }
        }
    }

    /// Replace the text of a message the bot sent earlier. Overlong text is
    /// cut to the first chunk; use [`split_message`] to send the rest.
    pub async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
    ) -> Result<(), TelegramError> {
        let chunk = split_message(text, MESSAGE_LIMIT)
            .into_iter()
            .next()
            .unwrap_or_default();
        let _: IgnoredAny = self
            .call(
                "editMessageText",
                &EditMessageText {
                    chat_id,
                    message_id,
                    text: &chunk,
                    disable_web_page_preview: true,
                },
            )
            .await?;
        Ok(())
    }

    pub async fn set_my_commands(&self, commands: &[BotCommand]) -> Result<(), TelegramError> {
        let _: bool = self.call("setMyCommands", &SetMyCommands { commands }).await?;
        Ok(())
    }
}

/// Split on line boundaries so every chunk has at most `limit` chars.
/// A single line longer than `limit` is hard-split. Never returns an empty
/// list; empty input yields one empty chunk.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split_inclusive('\n') {
        let line_len = line.chars().count();
        if current_len + line_len > limit && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if line_len > limit {
            let chars: Vec<char> = line.chars().collect();
            for piece in chars.chunks(limit) {
                if piece.len() == limit {
                    chunks.push(piece.iter().collect());
                } else {
                    current = piece.iter().collect();
                    current_len = piece.len();
                }
            }
            continue;
        }
        current.push_str(line);
        current_len += line_len;
    }
    if !current.is_empty() || chunks.is_empty() {
        chunks.push(current);
    }
    chunks
}
