//! Bot configuration

use robo_auth::{AllowList, Identity};
use robo_client::{DEFAULT_BASE_URL, RobotCredentials};
use robo_dispatch::DispatchSettings;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{BotError, BotResult};

pub const DEFAULT_TELEGRAM_URL: &str = "https://api.telegram.org";

/// Upper bound for `poll_timeout_secs`.
pub const MAX_POLL_TIMEOUT_SECS: u64 = 600;

/// Configuration for the robobot service, loaded once at startup.
///
/// The file is YAML; a JSON document is accepted as well.
#[derive(Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Telegram bot token from BotFather
    pub telegram_bot_api: String,

    /// Chat ids allowed to issue commands
    pub authorized_ids: Vec<Identity>,

    /// Robot web service user
    pub user: String,

    /// Robot web service password
    pub password: String,

    /// Robot web service base URL
    #[serde(default = "default_robot_url")]
    pub robot_url: String,

    /// Telegram Bot API base URL
    #[serde(default = "default_telegram_url")]
    pub telegram_url: String,

    /// Long-poll timeout for getUpdates in seconds
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,

    /// Delay before polling again after a failed poll, in seconds
    #[serde(default = "default_reconnect")]
    pub reconnect_delay_secs: u64,

    /// Only accept /reset_sure for a server and type offered by a recent /reset
    #[serde(default)]
    pub require_confirmation: bool,

    /// How long an offered reset stays confirmable, in seconds
    #[serde(default = "default_confirmation_ttl")]
    pub confirmation_ttl_secs: u64,
}

fn default_robot_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_telegram_url() -> String {
    DEFAULT_TELEGRAM_URL.to_string()
}

fn default_poll_timeout() -> u64 {
    60
}

fn default_reconnect() -> u64 {
    5
}

fn default_confirmation_ttl() -> u64 {
    300
}

impl BotConfig {
    pub fn load(path: &Path) -> BotResult<Self> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| BotError::Config(format!("read {}: {e}", path.display())))?;
        let config: Self = serde_yaml::from_str(&data)
            .map_err(|e| BotError::Config(format!("parse {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> BotResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = serde_yaml::to_string(self)?;
        std::fs::write(path, data)?;
        Ok(())
    }

    pub fn validate(&self) -> BotResult<()> {
        if self.telegram_bot_api.trim().is_empty() {
            return Err(BotError::Config("telegram_bot_api is empty".to_string()));
        }
        if self.user.trim().is_empty() {
            return Err(BotError::Config("user is empty".to_string()));
        }
        if self.poll_timeout_secs == 0 {
            return Err(BotError::Config("poll_timeout_secs must be positive".to_string()));
        }
        if self.poll_timeout_secs > MAX_POLL_TIMEOUT_SECS {
            return Err(BotError::Config(format!(
                "poll_timeout_secs must be at most {MAX_POLL_TIMEOUT_SECS}"
            )));
        }
        Ok(())
    }

    pub fn credentials(&self) -> RobotCredentials {
        RobotCredentials::new(&self.user, &self.password)
    }

    pub fn allow_list(&self) -> AllowList {
        AllowList::new(self.authorized_ids.iter().copied())
    }

    pub fn dispatch_settings(&self) -> DispatchSettings {
        DispatchSettings {
            require_confirmation: self.require_confirmation,
            confirmation_ttl: Duration::from_secs(self.confirmation_ttl_secs),
        }
    }

    /// Placeholder config written by `robobot init-config`.
    pub fn sample() -> Self {
        Self {
            telegram_bot_api: "123456:REPLACE-WITH-BOT-TOKEN".to_string(),
            authorized_ids: vec![123456789],
            user: "#ws+REPLACE".to_string(),
            password: "REPLACE".to_string(),
            robot_url: default_robot_url(),
            telegram_url: default_telegram_url(),
            poll_timeout_secs: default_poll_timeout(),
            reconnect_delay_secs: default_reconnect(),
            require_confirmation: false,
            confirmation_ttl_secs: default_confirmation_ttl(),
        }
    }
}

impl std::fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotConfig")
            .field("telegram_bot_api", &"<redacted>")
            .field("authorized_ids", &self.authorized_ids)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("robot_url", &self.robot_url)
            .field("telegram_url", &self.telegram_url)
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .field("reconnect_delay_secs", &self.reconnect_delay_secs)
            .field("require_confirmation", &self.require_confirmation)
            .field("confirmation_ttl_secs", &self.confirmation_ttl_secs)
            .finish()
    }
}
