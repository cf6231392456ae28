//! Access control for robobot.
//!
//! Provides [`AllowList`], the fixed set of chat identities allowed to issue
//! commands, and [`PendingResets`], the short-lived record of reset options
//! shown to an operator so a later confirmation can be checked against them.

#![forbid(unsafe_code)]

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tracing::debug;

/// Opaque chat participant identifier.
pub type Identity = i64;

// ─────────────────────────────────────────────────────────────
// Allow-list
// ─────────────────────────────────────────────────────────────

/// Chat identities allowed to talk to the bot. Built once at startup.
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    ids: HashSet<Identity>,
}

impl AllowList {
    pub fn new(ids: impl IntoIterator<Item = Identity>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
        }
    }

    pub fn is_authorized(&self, identity: Identity) -> bool {
        self.ids.contains(&identity)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────
// Pending resets
// ─────────────────────────────────────────────────────────────

/// Reset options that were offered to one identity for one server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingReset {
    pub server_ip: String,
    pub offered: Vec<String>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfirmError {
    #[error("no pending reset for {server_ip}")]
    NotPending { server_ip: String },

    #[error("reset type {reset_type} not offered for {server_ip}")]
    NotOffered {
        server_ip: String,
        reset_type: String,
        offered: Vec<String>,
    },
}

/// In-memory table of offered resets, keyed by identity and server IP.
///
/// Entries expire after the configured TTL and are consumed by a successful
/// confirmation. Nothing is persisted.
pub struct PendingResets {
    ttl: Duration,
    entries: Mutex<HashMap<(Identity, String), PendingReset>>,
}

impl PendingResets {
    pub fn new(ttl: std::time::Duration) -> Self {
        Self {
            ttl: Duration::from_std(ttl).unwrap_or_else(|_| Duration::seconds(300)),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn record(&self, identity: Identity, server_ip: &str, offered: &[String]) {
        self.record_at(identity, server_ip, offered, Utc::now());
    }

    pub fn record_at(
        &self,
        identity: Identity,
        server_ip: &str,
        offered: &[String],
        now: DateTime<Utc>,
    ) {
        let entry = PendingReset {
            server_ip: server_ip.to_string(),
            offered: offered.to_vec(),
            expires_at: now + self.ttl,
        };
        let mut entries = self.entries.lock();
        entries.retain(|_, e| e.expires_at > now);
        entries.insert((identity, server_ip.to_string()), entry);
        debug!(identity, server_ip, "recorded pending reset");
    }

    /// Check that `reset_type` was offered to `identity` for `server_ip` and
    /// the offer has not expired. Does not consume the entry.
    pub fn check(
        &self,
        identity: Identity,
        server_ip: &str,
        reset_type: &str,
    ) -> Result<(), ConfirmError> {
        self.check_at(identity, server_ip, reset_type, Utc::now())
    }

    pub fn check_at(
        &self,
        identity: Identity,
        server_ip: &str,
        reset_type: &str,
        now: DateTime<Utc>,
    ) -> Result<(), ConfirmError> {
        let entries = self.entries.lock();
        let pending = entries
            .get(&(identity, server_ip.to_string()))
            .filter(|e| e.expires_at > now)
            .ok_or_else(|| ConfirmError::NotPending {
                server_ip: server_ip.to_string(),
            })?;

        if !pending.offered.iter().any(|t| t == reset_type) {
            return Err(ConfirmError::NotOffered {
                server_ip: server_ip.to_string(),
                reset_type: reset_type.to_string(),
                offered: pending.offered.clone(),
            });
        }
        Ok(())
    }

    /// Remove the entry for `identity` and `server_ip`.
    pub fn consume(&self, identity: Identity, server_ip: &str) -> Option<PendingReset> {
        self.entries.lock().remove(&(identity, server_ip.to_string()))
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Default for PendingResets {
    fn default() -> Self {
        Self::new(std::time::Duration::from_secs(300))
    }
}
