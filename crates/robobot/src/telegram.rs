//! Telegram Bot API transport
//!
//! Long-polls `getUpdates` for inbound messages and answers with
//! `sendMessage`. Only the fields the bot reads are modelled.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::error::{BotError, BotResult};

/// Telegram rejects messages longer than this many characters.
pub const MAX_MESSAGE_CHARS: usize = 4096;

// ─── Wire types ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Serialize)]
struct GetUpdatesParams<'a> {
    offset: i64,
    timeout: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit: Option<u32>,
    allowed_updates: &'a [&'a str],
}

#[derive(Debug, Serialize)]
struct SendMessageParams<'a> {
    chat_id: i64,
    text: &'a str,
}

// ─── Transport trait ─────────────────────────────────────────────────────────

/// Inbound/outbound chat plumbing the serve loop runs on.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Fetch updates with `update_id >= offset`, waiting up to the poll timeout.
    async fn poll(&self, offset: i64) -> BotResult<Vec<Update>>;

    async fn send_text(&self, chat_id: i64, text: &str) -> BotResult<()>;

    /// Tell the server every update below `offset` is handled, without waiting.
    async fn acknowledge(&self, offset: i64) -> BotResult<()>;
}

// ─── Bot API client ──────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct TelegramClient {
    client: Client,
    base_url: String,
    token: String,
    poll_timeout_secs: u64,
}

impl std::fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramClient")
            .field("base_url", &self.base_url)
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .finish_non_exhaustive()
    }
}

impl TelegramClient {
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        poll_timeout_secs: u64,
    ) -> BotResult<Self> {
        // leave headroom over the server-side long-poll wait
        let client = Client::builder()
            .timeout(Duration::from_secs(poll_timeout_secs.saturating_add(15)))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            poll_timeout_secs,
        })
    }

    async fn call<P, T>(&self, method: &str, params: &P) -> BotResult<T>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}/bot{}/{method}", self.base_url, self.token);
        debug!(method, "Bot API request");

        let text = self.client.post(&url).json(params).send().await?.text().await?;
        let resp: ApiResponse<T> = serde_json::from_str(&text)?;

        match resp {
            ApiResponse {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            ApiResponse {
                description,
                error_code,
                ..
            } => Err(BotError::Transport(format!(
                "{method} failed ({}): {}",
                error_code.map(|c| c.to_string()).unwrap_or_else(|| "no code".to_string()),
                description.unwrap_or_else(|| "no description".to_string())
            ))),
        }
    }

    /// Verify the token; fails when the bot cannot authenticate.
    pub async fn get_me(&self) -> BotResult<User> {
        self.call("getMe", &serde_json::json!({})).await
    }

    pub async fn get_updates(&self, offset: i64) -> BotResult<Vec<Update>> {
        let params = GetUpdatesParams {
            offset,
            timeout: self.poll_timeout_secs,
            limit: None,
            allowed_updates: &["message"],
        };
        self.call("getUpdates", &params).await
    }

    /// Confirm updates below `offset` with a non-blocking `getUpdates`.
    pub async fn confirm_offset(&self, offset: i64) -> BotResult<()> {
        let params = GetUpdatesParams {
            offset,
            timeout: 0,
            limit: Some(1),
            allowed_updates: &["message"],
        };
        let _: Vec<Update> = self.call("getUpdates", &params).await?;
        Ok(())
    }

    pub async fn send_message(&self, chat_id: i64, text: &str) -> BotResult<Message> {
        self.call("sendMessage", &SendMessageParams { chat_id, text })
            .await
    }
}

#[async_trait]
impl ChatTransport for TelegramClient {
    async fn poll(&self, offset: i64) -> BotResult<Vec<Update>> {
        self.get_updates(offset).await
    }

    async fn send_text(&self, chat_id: i64, text: &str) -> BotResult<()> {
        for chunk in split_message(text, MAX_MESSAGE_CHARS) {
            self.send_message(chat_id, &chunk).await?;
        }
        Ok(())
    }

    async fn acknowledge(&self, offset: i64) -> BotResult<()> {
        self.confirm_offset(offset).await
    }
}

/// Split `text` into pieces of at most `limit` characters, preferring line
/// boundaries. A single line longer than `limit` is cut mid-line.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split('\n') {
        let line_len = line.chars().count();
        let sep = usize::from(!current.is_empty());

        if current_len + sep + line_len <= limit {
            if sep == 1 {
                current.push('\n');
            }
            current.push_str(line);
            current_len += sep + line_len;
            continue;
        }

        if !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        let mut chars = line.chars().peekable();
        while chars.peek().is_some() {
            let piece: String = chars.by_ref().take(limit).collect();
            let piece_len = piece.chars().count();
            if piece_len == limit {
                chunks.push(piece);
            } else {
                current = piece;
                current_len = piece_len;
            }
        }
    }

    if !current.is_empty() || chunks.is_empty() {
        chunks.push(current);
    }
    chunks
}
