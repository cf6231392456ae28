//! Command dispatcher for robobot.
//!
//! Turns one inbound chat message into at most one Robot API call and one
//! reply. Messages from identities outside the allow-list are dropped before
//! anything else happens.
//!
//! Resets are two-phase:
//! - `/reset <ip>` only reads the available reset types and tells the operator
//!   how to confirm.
//! - `/reset_sure <ip> <type>` executes the reset.
//!
//! With `require_confirmation` enabled, the second phase is only accepted for
//! a server and reset type offered to the same identity by a recent first
//! phase.

#![forbid(unsafe_code)]

use robo_auth::{AllowList, ConfirmError, Identity, PendingResets};
use robo_client::RobotApi;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

// ─── Reply texts ──────────────────────────────────────────────────────────────

pub const HELP_TEXT: &str = "Available commands:\n/list - to list servers\n/reset IP - to issue reset";
pub const UNKNOWN_TEXT: &str = "Click /help if dont know what to do";
pub const MISSING_IP_TEXT: &str = "Please provide a valid IP";
pub const RESET_SURE_USAGE_TEXT: &str = "Please provide valid arguments: /reset_sure IP TYPE";
pub const REMOTE_FAILURE_TEXT: &str = "Remote API request failed, please try again later";
pub const NO_SERVERS_TEXT: &str = "No servers found";

// ─── Invocation ───────────────────────────────────────────────────────────────

/// Command name and raw argument string of one chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    pub name: String,
    pub args: String,
}

impl CommandInvocation {
    /// Split `/name@bot rest of line` into `("name", "rest of line")`.
    ///
    /// Text that is not a command yields an empty name, which dispatches to
    /// the unknown-command fallback.
    pub fn parse(text: &str) -> Self {
        let text = text.trim_start();
        let Some(body) = text.strip_prefix('/') else {
            return Self {
                name: String::new(),
                args: String::new(),
            };
        };

        let (head, rest) = match body.find(char::is_whitespace) {
            Some(idx) => (&body[..idx], &body[idx..]),
            None => (body, ""),
        };
        let name = head.split('@').next().unwrap_or_default();

        Self {
            name: name.to_string(),
            args: rest.trim().to_string(),
        }
    }
}

// ─── Commands ─────────────────────────────────────────────────────────────────

/// The closed set of commands the bot understands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "command")]
pub enum Command {
    Help,
    List,
    /// Phase 1: discover reset types. Read-only.
    Reset { server_ip: String },
    /// Phase 2: execute the reset.
    ResetSure {
        server_ip: String,
        reset_type: String,
    },
    Unknown { name: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing or invalid server address: {0:?}")]
    InvalidTarget(String),

    #[error("expected `<ip> <type>`, got {0:?}")]
    ResetSureArgs(String),
}

impl ValidationError {
    /// Corrective message sent back to the operator.
    pub fn reply_text(&self) -> &'static str {
        match self {
            Self::InvalidTarget(_) => MISSING_IP_TEXT,
            Self::ResetSureArgs(_) => RESET_SURE_USAGE_TEXT,
        }
    }
}

impl Command {
    pub fn from_invocation(inv: &CommandInvocation) -> Result<Self, ValidationError> {
        match inv.name.as_str() {
            "help" => Ok(Self::Help),
            "list" => Ok(Self::List),
            "reset" => {
                if !is_valid_target(&inv.args) {
                    return Err(ValidationError::InvalidTarget(inv.args.clone()));
                }
                Ok(Self::Reset {
                    server_ip: inv.args.clone(),
                })
            }
            "reset_sure" => {
                let parts: Vec<&str> = inv.args.split_whitespace().collect();
                match parts.as_slice() {
                    [ip, reset_type] if is_valid_target(ip) => Ok(Self::ResetSure {
                        server_ip: ip.to_string(),
                        reset_type: reset_type.to_string(),
                    }),
                    _ => Err(ValidationError::ResetSureArgs(inv.args.clone())),
                }
            }
            other => Ok(Self::Unknown {
                name: other.to_string(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Help => "help",
            Self::List => "list",
            Self::Reset { .. } => "reset",
            Self::ResetSure { .. } => "reset_sure",
            Self::Unknown { name } => name,
        }
    }
}

/// A server address is used as a URL path segment, so it must be a single
/// token of address characters (IPv4, IPv6 or a server number).
fn is_valid_target(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == ':')
        && s.chars().any(|c| c.is_ascii_alphanumeric())
}

// ─── Dispatcher ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// Reject `/reset_sure` unless a matching `/reset` was answered recently.
    pub require_confirmation: bool,
    pub confirmation_ttl: Duration,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            require_confirmation: false,
            confirmation_ttl: Duration::from_secs(300),
        }
    }
}

pub struct Dispatcher {
    api: Arc<dyn RobotApi>,
    allow_list: AllowList,
    pending: PendingResets,
    require_confirmation: bool,
}

impl Dispatcher {
    pub fn new(api: Arc<dyn RobotApi>, allow_list: AllowList) -> Self {
        Self::with_settings(api, allow_list, DispatchSettings::default())
    }

    pub fn with_settings(
        api: Arc<dyn RobotApi>,
        allow_list: AllowList,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            api,
            allow_list,
            pending: PendingResets::new(settings.confirmation_ttl),
            require_confirmation: settings.require_confirmation,
        }
    }

    /// Handle one inbound chat message. `None` means nothing is sent back.
    pub async fn handle_message(&self, sender: Identity, text: &str) -> Option<String> {
        if !self.allow_list.is_authorized(sender) {
            debug!(sender, "dropping message from unauthorized identity");
            return None;
        }

        let invocation = CommandInvocation::parse(text);
        let reply = match Command::from_invocation(&invocation) {
            Ok(command) => self.execute(sender, command).await,
            Err(e) => {
                debug!(sender, command = %invocation.name, error = %e, "rejected arguments");
                e.reply_text().to_string()
            }
        };
        Some(reply)
    }

    /// Run an already-parsed command for `sender`. The allow-list is not
    /// consulted here.
    pub async fn execute(&self, sender: Identity, command: Command) -> String {
        debug!(sender, command = command.name(), "dispatching command");

        match command {
            Command::Help => HELP_TEXT.to_string(),
            Command::List => self.list().await,
            Command::Reset { server_ip } => self.reset_query(sender, &server_ip).await,
            Command::ResetSure {
                server_ip,
                reset_type,
            } => self.reset_commit(sender, &server_ip, &reset_type).await,
            Command::Unknown { .. } => UNKNOWN_TEXT.to_string(),
        }
    }

    async fn list(&self) -> String {
        match self.api.list_servers().await {
            Ok(servers) if servers.is_empty() => NO_SERVERS_TEXT.to_string(),
            Ok(servers) => servers
                .iter()
                .map(|s| s.summary_line())
                .collect::<Vec<_>>()
                .join("\n"),
            Err(e) => {
                warn!(error = %e, "list servers failed");
                REMOTE_FAILURE_TEXT.to_string()
            }
        }
    }

    async fn reset_query(&self, sender: Identity, server_ip: &str) -> String {
        let descriptor = match self.api.reset_options(server_ip).await {
            Ok(d) => d,
            Err(e) => {
                warn!(server_ip, error = %e, "fetching reset options failed");
                return REMOTE_FAILURE_TEXT.to_string();
            }
        };

        if descriptor.server_ip != server_ip {
            warn!(
                requested = server_ip,
                echoed = %descriptor.server_ip,
                "reset options returned for a different server"
            );
            return format!(
                "Reset options returned for {} instead of {server_ip}",
                descriptor.server_ip
            );
        }

        if self.require_confirmation {
            self.pending.record(sender, server_ip, &descriptor.reset_types);
        }

        format!(
            "Available reset types:\n{}\nTo reset server with sw type send:\n\n/reset_sure {server_ip} sw",
            descriptor.reset_types.join(" ")
        )
    }

    async fn reset_commit(&self, sender: Identity, server_ip: &str, reset_type: &str) -> String {
        if self.require_confirmation {
            match self.pending.check(sender, server_ip, reset_type) {
                Ok(()) => {}
                Err(ConfirmError::NotPending { .. }) => {
                    return format!("No pending reset for {server_ip}, run /reset {server_ip} first");
                }
                Err(ConfirmError::NotOffered { offered, .. }) => {
                    return format!(
                        "Reset type {reset_type} not offered for {server_ip}, choose one of: {}",
                        offered.join(" ")
                    );
                }
            }
        }

        match self.api.execute_reset(server_ip, reset_type).await {
            Ok(outcome) => {
                self.pending.consume(sender, server_ip);
                info!(
                    sender,
                    server_ip = %outcome.reset.server_ip,
                    reset_type = %outcome.reset.reset_type,
                    status = %outcome.status,
                    "reset executed"
                );
                outcome.status
            }
            Err(e) => {
                warn!(server_ip, reset_type, error = %e, "reset failed");
                REMOTE_FAILURE_TEXT.to_string()
            }
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
