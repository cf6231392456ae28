//! Wire types for the Robot web service.
//!
//! Every response body of the Robot API wraps its payload in a single named
//! object (`{"server": {...}}`, `{"reset": {...}}`, `{"error": {...}}`). The
//! envelope structs here mirror that layout so `serde_json` can decode the
//! bodies directly, and the accessor methods hand out the inner records.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

// ─── Servers ──────────────────────────────────────────────────────────────────

/// One element of the `GET /server` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerEnvelope {
    pub server: ServerRecord,
}

/// Snapshot of one managed dedicated server.
///
/// Fields the API may send as `null` or leave out (IPv6-only servers have no
/// `server_ip`, unpaid ones no `paid_until`) decode to their zero value so a
/// single odd record does not fail the whole listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerRecord {
    /// Primary IPv4 address.
    #[serde(default, deserialize_with = "null_as_default")]
    pub server_ip: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub server_number: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub server_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub product: String,
    /// Datacenter, e.g. `FSN1-DC14`.
    #[serde(default, deserialize_with = "null_as_default")]
    pub dc: String,
    /// Traffic allowance, e.g. `5 TB` or `unlimited`.
    #[serde(default, deserialize_with = "null_as_default")]
    pub traffic: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub flatrate: bool,
    /// Lifecycle status: `ready` or `in process`.
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub throttled: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cancelled: bool,
    /// `YYYY-MM-DD`.
    #[serde(default, deserialize_with = "null_as_default")]
    pub paid_until: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub ip: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub subnet: Vec<Subnet>,
}

/// Decode `null` as the type's default (`""`, `0`, `false`, `[]`).
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subnet {
    pub ip: String,
    pub mask: String,
}

impl ServerRecord {
    /// The `<ip> <name>` line used in server listings.
    pub fn summary_line(&self) -> String {
        format!("{} {}", self.server_ip, self.server_name)
    }
}

// ─── Reset ────────────────────────────────────────────────────────────────────

/// Body of `GET /reset/{ip}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetOptionsEnvelope {
    pub reset: ResetDescriptor,
}

/// The reset mechanisms available for one server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetDescriptor {
    #[serde(default, deserialize_with = "null_as_default")]
    pub server_ip: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub server_number: u64,
    /// Supported reset tokens (`sw`, `hw`, `man`, `power`, ...).
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub reset_types: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub operating_status: String,
}

impl ResetDescriptor {
    pub fn offers(&self, reset_type: &str) -> bool {
        self.reset_types.iter().any(|t| t == reset_type)
    }
}

/// Body of `POST /reset/{ip}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetEnvelope {
    pub reset: ExecutedReset,
}

/// What the remote side reports it acted on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutedReset {
    pub server_ip: String,
    #[serde(rename = "type")]
    pub reset_type: String,
}

/// Form body of `POST /reset/{ip}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResetRequest<'a> {
    #[serde(rename = "type")]
    pub reset_type: &'a str,
}

/// Result of executing a reset: the HTTP status line plus the decoded body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetOutcome {
    /// Status line as sent by the server, e.g. `200 OK`.
    pub status: String,
    pub reset: ExecutedReset,
}

// ─── Errors ───────────────────────────────────────────────────────────────────

/// Error envelope returned with non-2xx responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorEnvelope {
    pub error: ApiErrorBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub status: u16,
    /// Machine-readable code, e.g. `SERVER_NOT_FOUND` or `RESET_NOT_AVAILABLE`.
    pub code: String,
    pub message: String,
}
