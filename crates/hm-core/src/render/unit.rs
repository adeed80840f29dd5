//! systemd service descriptors

use std::path::{Path, PathBuf};

/// Directory the client units may write to
const CLIENT_STATE_DIR: &str = "/var/lib/hysteria";

/// Directory the server unit logs into
const SERVER_LOG_DIR: &str = "/var/log";

/// Contents of a `.service` descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitSpec {
    pub description: String,
    pub exec_start: String,
    pub user: String,
    pub group: String,
    pub read_write_paths: Vec<PathBuf>,
}

impl UnitSpec {
    /// Server unit: runs as root, may write logs and its own config dir
    pub fn server(binary: &Path, config_file: &Path, hysteria_dir: &Path) -> Self {
        Self {
            description: "Hysteria2 Server".to_string(),
            exec_start: exec_line(binary, "server", config_file),
            user: "root".to_string(),
            group: "root".to_string(),
            read_write_paths: vec![PathBuf::from(SERVER_LOG_DIR), hysteria_dir.to_path_buf()],
        }
    }

    /// Client unit: runs unprivileged
    pub fn client(binary: &Path, config_file: &Path, client_id: &str) -> Self {
        Self {
            description: format!("Hysteria2 Client {}", client_id),
            exec_start: exec_line(binary, "client", config_file),
            user: "nobody".to_string(),
            group: "nogroup".to_string(),
            read_write_paths: vec![PathBuf::from(CLIENT_STATE_DIR)],
        }
    }

    /// Render the descriptor text
    pub fn render(&self) -> String {
        let read_write: String = self
            .read_write_paths
            .iter()
            .map(|p| format!("ReadWritePaths={}\n", p.display()))
            .collect();

        format!(
            r#"[Unit]
Description={description}
After=network.target

[Service]
Type=simple
ExecStart={exec_start}
Restart=on-failure
RestartSec=5
User={user}
Group={group}

# Security settings
NoNewPrivileges=yes
PrivateTmp=yes
ProtectSystem=strict
ProtectHome=yes
{read_write}ProtectKernelTunables=yes
ProtectKernelModules=yes
ProtectControlGroups=yes

[Install]
WantedBy=multi-user.target
"#,
            description = self.description,
            exec_start = self.exec_start,
            user = self.user,
            group = self.group,
            read_write = read_write,
        )
    }
}

fn exec_line(binary: &Path, mode: &str, config_file: &Path) -> String {
    format!("{} {} --config {}", binary.display(), mode, config_file.display())
}
