//! Bot error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BotError {
    #[error("config error: {0}")]
    Config(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("remote error: {0}")]
    Remote(#[from] robo_client::RemoteError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for BotError {
    /// Bot API URLs embed the bot token, so it is stripped from the message.
    fn from(e: reqwest::Error) -> Self {
        BotError::Transport(e.without_url().to_string())
    }
}

pub type BotResult<T> = Result<T, BotError>;
