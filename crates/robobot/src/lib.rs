//! robobot — chat front end for the Robot dedicated-server API
//!
//! Receives Telegram commands from an allow-listed set of chats and turns them
//! into server listings and two-phase resets.

#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod serve;
pub mod telegram;

use robo_client::RobotClient;
use robo_dispatch::Dispatcher;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub use config::BotConfig;
pub use error::{BotError, BotResult};
pub use serve::Bot;
pub use telegram::{ChatTransport, TelegramClient};

/// Build the dispatcher and its Robot API client from config.
pub fn build_dispatcher(config: &BotConfig) -> BotResult<Dispatcher> {
    let client = RobotClient::new(config.credentials(), config.robot_url.clone())?;
    let allow_list = config.allow_list();
    if allow_list.is_empty() {
        warn!("authorized_ids is empty, every message will be ignored");
    }
    Ok(Dispatcher::with_settings(
        Arc::new(client),
        allow_list,
        config.dispatch_settings(),
    ))
}

/// Connect to Telegram and build a ready-to-run bot.
///
/// Fails if the bot token is rejected or the Bot API is unreachable.
pub async fn connect(config: &BotConfig) -> BotResult<Bot<TelegramClient>> {
    let transport = TelegramClient::new(
        config.telegram_url.clone(),
        config.telegram_bot_api.clone(),
        config.poll_timeout_secs,
    )?;
    let me = transport.get_me().await?;
    info!(
        bot_id = me.id,
        username = me.username.as_deref().unwrap_or("unknown"),
        "authorized on Telegram"
    );

    let dispatcher = build_dispatcher(config)?;
    Ok(Bot::new(
        transport,
        dispatcher,
        Duration::from_secs(config.reconnect_delay_secs),
    ))
}
