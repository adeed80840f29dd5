//! Manager configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::serde_utils::duration_secs;
use crate::types::{ClientId, ClientMap, ClientRecord};

/// Configuration for the manager daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Address the HTTP API binds to
    pub bind_address: String,

    /// Append-only status log written by the monitor service
    pub log_file: PathBuf,

    /// Upper bound on lines returned by a log snapshot
    pub max_log_lines: usize,

    /// Lines returned when the caller does not ask for a count
    pub default_log_lines: usize,

    /// Directory for rendered proxy configs and certificates
    pub hysteria_dir: PathBuf,

    /// Persisted client collection
    pub clients_file: PathBuf,

    /// Persisted server record
    pub server_file: PathBuf,

    /// The Hysteria2 binary
    pub binary_path: PathBuf,

    /// Where service descriptors are written
    pub unit_dir: PathBuf,

    /// Unit name of the local server instance
    pub server_service: String,

    /// Unit name of the status monitor
    pub monitor_service: String,

    /// Time budget for the binary install script
    #[serde(with = "duration_secs")]
    pub install_timeout: Duration,

    /// Connect timeout for SOCKS5 reachability probes
    #[serde(with = "duration_secs")]
    pub probe_timeout: Duration,

    /// How long a live tail sleeps when no new data is available
    #[serde(with = "duration_secs")]
    pub tail_poll_interval: Duration,

    /// Plain-text "what is my IP" services, tried in order
    pub public_ip_endpoints: Vec<String>,

    /// Per-endpoint timeout for public IP detection
    #[serde(with = "duration_secs")]
    pub public_ip_timeout: Duration,

    /// Client ids that can never be removed
    pub protected_clients: Vec<ClientId>,

    /// Collection written when no clients file exists yet
    pub seed_clients: ClientMap,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        let hysteria_dir = PathBuf::from("/etc/hysteria");
        let state_dir = PathBuf::from(super::DEFAULT_STATE_DIR);

        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            log_file: PathBuf::from("/var/log/hysteria-monitor.log"),
            max_log_lines: 1000,
            default_log_lines: 50,
            clients_file: state_dir.join("clients.json"),
            server_file: state_dir.join("server.json"),
            binary_path: PathBuf::from("/usr/local/bin/hysteria"),
            unit_dir: PathBuf::from("/etc/systemd/system"),
            server_service: "hysteria-server".to_string(),
            monitor_service: "hysteria-monitor".to_string(),
            install_timeout: Duration::from_secs(300),
            probe_timeout: Duration::from_secs(2),
            tail_poll_interval: Duration::from_secs(1),
            public_ip_endpoints: vec![
                "http://ifconfig.me".to_string(),
                "http://ipecho.net/plain".to_string(),
                "http://icanhazip.com".to_string(),
            ],
            public_ip_timeout: Duration::from_secs(5),
            protected_clients: vec![ClientId::new("client1"), ClientId::new("client2")],
            seed_clients: default_seed_clients(&hysteria_dir),
            hysteria_dir,
        }
    }
}

impl ManagerConfig {
    /// Whether `id` is excluded from removal
    pub fn is_protected(&self, id: &ClientId) -> bool {
        self.protected_clients.contains(id)
    }

    /// Rendered configuration path for a client
    pub fn client_config_path(&self, id: &ClientId) -> PathBuf {
        self.hysteria_dir.join(format!("{}.yaml", id))
    }

    /// Rendered configuration path for the server
    pub fn server_config_path(&self) -> PathBuf {
        self.hysteria_dir.join("server.yaml")
    }

    /// Directory holding the server certificate and key
    pub fn cert_dir(&self) -> PathBuf {
        self.hysteria_dir.join("certs")
    }
}

/// The two clients every installation starts with
fn default_seed_clients(hysteria_dir: &std::path::Path) -> ClientMap {
    let mut clients = ClientMap::new();
    clients.insert(
        ClientId::new("client1"),
        ClientRecord {
            display_name: "Client1 (138.197.130.170)".to_string(),
            remote_host: "138.197.130.170".to_string(),
            remote_port: 443,
            local_proxy_port: 1090,
            config_file: hysteria_dir.join("client.yaml"),
            password: "pass1234".to_string(),
        },
    );
    clients.insert(
        ClientId::new("client2"),
        ClientRecord {
            display_name: "Client2 (185.55.241.111)".to_string(),
            remote_host: "185.55.241.111".to_string(),
            remote_port: 443,
            local_proxy_port: 1080,
            config_file: hysteria_dir.join("client2.yaml"),
            password: "pass1234".to_string(),
        },
    );
    clients
}
