//! Core domain types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Prefix shared by every service unit this manager registers
pub const SERVICE_PREFIX: &str = "hysteria-";

/// Prefix of generated client identifiers
pub const CLIENT_ID_PREFIX: &str = "client";

/// Unique identifier for a client (`client<N>`)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    /// Create a client ID from any string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Build the canonical id for slot `n`
    pub fn numbered(n: u32) -> Self {
        Self(format!("{}{}", CLIENT_ID_PREFIX, n))
    }

    /// Slot number for canonical ids, `None` for anything else
    pub fn number(&self) -> Option<u32> {
        self.0.strip_prefix(CLIENT_ID_PREFIX)?.parse().ok()
    }

    /// Name of the service unit running this client
    pub fn service_name(&self) -> String {
        format!("{}{}", SERVICE_PREFIX, self.0)
    }

    /// Get the raw ID string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ClientId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A persisted client entry. The id is the key it is stored under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRecord {
    /// Human-readable label
    pub display_name: String,
    /// Address of the remote Hysteria2 server
    pub remote_host: String,
    /// Port of the remote Hysteria2 server
    pub remote_port: u16,
    /// Local SOCKS5 listener port
    pub local_proxy_port: u16,
    /// Rendered client configuration
    pub config_file: PathBuf,
    /// Auth and obfuscation secret
    pub password: String,
}

/// All known clients, sorted by id
pub type ClientMap = BTreeMap<ClientId, ClientRecord>;

/// Liveness of a client as seen by the health monitor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientStatus {
    /// Not probed
    #[default]
    Unknown,
    /// Service active and SOCKS5 port accepting connections
    Online,
    /// Anything else
    Offline,
}

impl fmt::Display for ClientStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientStatus::Unknown => write!(f, "unknown"),
            ClientStatus::Online => write!(f, "online"),
            ClientStatus::Offline => write!(f, "offline"),
        }
    }
}

/// A client record as returned to callers, with derived fields filled in
#[derive(Debug, Clone, Serialize)]
pub struct ClientSnapshot {
    pub id: ClientId,
    #[serde(flatten)]
    pub record: ClientRecord,
    pub service: String,
    pub status: ClientStatus,
}

impl ClientSnapshot {
    /// Snapshot with status not yet probed
    pub fn unprobed(id: &ClientId, record: &ClientRecord) -> Self {
        Self {
            id: id.clone(),
            record: record.clone(),
            service: id.service_name(),
            status: ClientStatus::Unknown,
        }
    }
}

/// Persisted state of the local Hysteria2 server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerRecord {
    /// Binary was installed by a setup run (recomputed on status queries)
    pub installed: bool,
    /// A server configuration has been rendered and registered
    pub configured: bool,
    /// Never trusted from disk
    #[serde(skip)]
    pub running: bool,
    /// UDP listen port
    pub listen_port: u16,
    /// Auth and obfuscation secret
    pub password: String,
    /// Domain or detected public IP the certificate was issued for
    pub domain: Option<String>,
    /// Rendered server configuration
    pub config_file: PathBuf,
}

impl Default for ServerRecord {
    fn default() -> Self {
        Self {
            installed: false,
            configured: false,
            running: false,
            listen_port: 443,
            password: String::new(),
            domain: None,
            config_file: PathBuf::from("/etc/hysteria/server.yaml"),
        }
    }
}
