//! Local server lifecycle: `uninstalled → installed → configured → running`

use std::sync::Arc;

use hm_core::alloc::SERVER_PASSWORD_LEN;
use hm_core::config::ManagerConfig;
use hm_core::render::{render_server_config, UnitSpec};
use hm_core::{ConfigStore, ManagerError, ServerRecord};
use serde::Serialize;

use super::rollback::Rollback;
use super::{password_or_generate, port_in_range, validate_domain};
use crate::health::NetworkProbe;
use crate::provision::{BinaryInstaller, CertificatePaths, CertificateProvisioner};
use crate::system::ServiceUnitManager;

/// Certificate subject when neither a domain nor a public IP is known
const FALLBACK_SUBJECT: &str = "hysteria-server";

/// Parameters of a server setup
#[derive(Debug, Clone)]
pub struct ServerSetup {
    pub port: i64,
    pub password: Option<String>,
    pub domain: Option<String>,
}

impl Default for ServerSetup {
    fn default() -> Self {
        Self {
            port: 443,
            password: None,
            domain: None,
        }
    }
}

/// Connection details handed back after setup
#[derive(Debug, Clone, Serialize)]
pub struct ServerInfo {
    pub ip: Option<String>,
    pub port: u16,
    pub password: String,
    pub domain: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SetupOutcome {
    pub message: String,
    pub server_info: ServerInfo,
}

/// Live server state merged with the persisted record
#[derive(Debug, Clone, Serialize)]
pub struct ServerStatus {
    pub installed: bool,
    pub configured: bool,
    pub running: bool,
    pub config: ServerRecord,
}

/// Installs, configures and reports on the local server
pub struct ServerOrchestrator {
    config: Arc<ManagerConfig>,
    store: Arc<ConfigStore>,
    units: Arc<ServiceUnitManager>,
    certs: CertificateProvisioner,
    installer: BinaryInstaller,
    probe: Arc<NetworkProbe>,
}

impl ServerOrchestrator {
    pub fn new(
        config: Arc<ManagerConfig>,
        store: Arc<ConfigStore>,
        units: Arc<ServiceUnitManager>,
        certs: CertificateProvisioner,
        installer: BinaryInstaller,
        probe: Arc<NetworkProbe>,
    ) -> Self {
        Self {
            config,
            store,
            units,
            certs,
            installer,
            probe,
        }
    }

    /// Install the binary
    pub async fn install(&self) -> Result<String, ManagerError> {
        self.installer.install().await?;
        Ok("Hysteria2 installed successfully".to_string())
    }

    /// Recompute `installed` and `running`, keep the rest from disk
    pub async fn status(&self) -> ServerStatus {
        let installed = self.installer.is_installed().await;
        let running = self.units.controller().is_active(&self.config.server_service).await;

        let mut record = self.store.load_server().value;
        record.installed = installed;
        record.running = running;

        ServerStatus {
            installed,
            configured: record.configured,
            running,
            config: record,
        }
    }

    /// Install if needed, issue a certificate, render the config and start the unit
    pub async fn setup(&self, request: ServerSetup) -> Result<SetupOutcome, ManagerError> {
        let port = port_in_range(request.port, 1, "Invalid port")?;
        let password = password_or_generate(request.password.as_deref(), SERVER_PASSWORD_LEN)?;
        let domain = request
            .domain
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        if let Some(domain) = &domain {
            validate_domain(domain)?;
        }

        if !self.installer.is_installed().await {
            tracing::info!("Hysteria2 binary missing, installing before setup");
            self.installer.install().await?;
        }

        let public_ip = self.probe.public_ip().await.map(|ip| ip.to_string());
        let subject = domain
            .clone()
            .or_else(|| public_ip.clone())
            .unwrap_or_else(|| FALLBACK_SUBJECT.to_string());

        let _guard = self.store.exclusive().await;
        // An unreadable record is left in place for the operator
        self.store.server_for_update()?;
        let mut rollback = Rollback::new();
        if let Err(e) = self.provision(port, &password, &subject, &mut rollback).await {
            tracing::error!("Server setup failed, rolling back: {}", e);
            rollback.unwind(&self.units).await;
            return Err(e);
        }
        rollback.commit();

        let record = ServerRecord {
            installed: true,
            configured: true,
            running: true,
            listen_port: port,
            password: password.clone(),
            domain: domain.clone().or_else(|| public_ip.clone()),
            config_file: self.config.server_config_path(),
        };
        if let Err(e) = self.store.save_server(&record) {
            // The server is up; only the bookkeeping is stale
            tracing::warn!("Failed to persist server record: {}", e);
        }

        tracing::info!("Server configured on port {} for {}", port, subject);
        Ok(SetupOutcome {
            message: "Hysteria2 server configured and started successfully".to_string(),
            server_info: ServerInfo {
                ip: public_ip,
                port,
                password,
                domain,
            },
        })
    }

    async fn provision(
        &self,
        port: u16,
        password: &str,
        subject: &str,
        rollback: &mut Rollback,
    ) -> Result<(), ManagerError> {
        let CertificatePaths { cert, key } = self.certs.paths();
        rollback.track_write(&cert).await?;
        rollback.track_write(&key).await?;
        let paths = self.certs.self_signed(subject).await?;

        let config_file = self.config.server_config_path();
        rollback.track_write(&config_file).await?;
        if let Some(parent) = config_file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let rendered = render_server_config(port, password, &paths.cert, &paths.key);
        tokio::fs::write(&config_file, rendered).await?;

        let service = &self.config.server_service;
        let was_registered = self.units.is_registered(service).await;
        rollback.track_write(&self.units.unit_path(service)).await?;
        let spec = UnitSpec::server(&self.config.binary_path, &config_file, &self.config.hysteria_dir);
        self.units.write_descriptor(service, &spec).await?;

        if was_registered {
            self.units.reactivate(service).await
        } else {
            rollback.track_activation(service);
            self.units.activate(service).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::ToolOutput;
    use crate::testing::{ControllerCall, FakeController, ScriptedRunner};
    use std::time::Duration;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        config: Arc<ManagerConfig>,
        controller: Arc<FakeController>,
        runner: Arc<ScriptedRunner>,
        server: ServerOrchestrator,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let config = Arc::new(ManagerConfig {
            hysteria_dir: dir.path().join("hysteria"),
            unit_dir: dir.path().join("units"),
            clients_file: dir.path().join("clients.json"),
            server_file: dir.path().join("server.json"),
            public_ip_endpoints: Vec::new(),
            ..Default::default()
        });
        let controller = Arc::new(FakeController::new());
        let runner = Arc::new(ScriptedRunner::new());
        let store = Arc::new(ConfigStore::new(
            config.clients_file.clone(),
            config.server_file.clone(),
            config.seed_clients.clone(),
        ));
        let units = Arc::new(ServiceUnitManager::new(config.unit_dir.clone(), controller.clone()));
        let certs = CertificateProvisioner::new(config.cert_dir(), runner.clone());
        let installer = BinaryInstaller::new(config.binary_path.clone(), config.install_timeout, runner.clone());
        let probe = Arc::new(NetworkProbe::new(
            Vec::new(),
            Duration::from_millis(100),
            Duration::from_millis(100),
        ));

        Fixture {
            server: ServerOrchestrator::new(config.clone(), store, units, certs, installer, probe),
            controller,
            runner,
            config,
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn test_setup_renders_and_starts() {
        let fx = fixture();
        let outcome = fx
            .server
            .setup(ServerSetup {
                port: 8443,
                password: Some("serverpass123".to_string()),
                domain: Some("vpn.example.org".to_string()),
            })
            .await
            .unwrap();

        assert_eq!(outcome.server_info.port, 8443);
        assert_eq!(outcome.server_info.domain.as_deref(), Some("vpn.example.org"));

        let rendered = std::fs::read_to_string(fx.config.server_config_path()).unwrap();
        assert!(rendered.contains("listen: :8443\n"));
        assert!(rendered.contains("password: serverpass123\n"));
        assert!(fx.config.unit_dir.join("hysteria-server.service").exists());
        assert!(fx
            .runner
            .command_lines()
            .iter()
            .any(|l| l.starts_with("openssl req") && l.ends_with("/CN=vpn.example.org")));
        assert!(fx
            .controller
            .calls()
            .contains(&ControllerCall::Start("hysteria-server".to_string())));

        let status = fx.server.status().await;
        assert!(status.configured);
        assert!(status.running);
        assert_eq!(status.config.listen_port, 8443);
    }

    #[tokio::test]
    async fn test_setup_without_domain_or_ip_uses_placeholder_subject() {
        let fx = fixture();
        let outcome = fx.server.setup(ServerSetup::default()).await.unwrap();

        assert_eq!(outcome.server_info.password.len(), 16);
        assert_eq!(outcome.server_info.ip, None);
        assert!(fx
            .runner
            .command_lines()
            .iter()
            .any(|l| l.ends_with("/CN=hysteria-server")));
    }

    #[tokio::test]
    async fn test_setup_installs_missing_binary() {
        let fx = fixture();
        fx.runner
            .respond("/usr/local/bin/hysteria version", ToolOutput::failed("No such file"));

        fx.server.setup(ServerSetup::default()).await.unwrap();
        assert!(fx.runner.command_lines().iter().any(|l| l.starts_with("bash -c")));
    }

    #[tokio::test]
    async fn test_install_failure_aborts_setup() {
        let fx = fixture();
        fx.runner
            .respond("/usr/local/bin/hysteria version", ToolOutput::failed("No such file"));
        fx.runner.time_out("bash");

        let err = fx.server.setup(ServerSetup::default()).await.unwrap_err();
        assert!(matches!(err, ManagerError::Tool(_)));
        assert!(!fx.config.server_config_path().exists());
        assert!(fx.controller.calls().is_empty());
    }

    #[tokio::test]
    async fn test_certificate_failure_rolls_back() {
        let fx = fixture();
        fx.runner.respond("openssl", ToolOutput::failed("bad subject"));

        let err = fx.server.setup(ServerSetup::default()).await.unwrap_err();
        assert_eq!(err.public_message(), "openssl failed");
        assert!(!fx.config.server_config_path().exists());
        assert!(!fx.server.status().await.configured);
    }

    #[tokio::test]
    async fn test_resetup_restarts_and_restores_on_failure() {
        let fx = fixture();
        fx.server.setup(ServerSetup::default()).await.unwrap();
        let first = std::fs::read_to_string(fx.config.server_config_path()).unwrap();

        fx.controller.fail_on("restart");
        let err = fx
            .server
            .setup(ServerSetup {
                port: 9443,
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ManagerError::Tool(_)));

        // Previous config is back and the unit was not torn down
        let restored = std::fs::read_to_string(fx.config.server_config_path()).unwrap();
        assert_eq!(restored, first);
        assert!(!fx
            .controller
            .calls()
            .contains(&ControllerCall::Disable("hysteria-server".to_string())));
    }

    #[tokio::test]
    async fn test_invalid_setup_input() {
        let fx = fixture();
        let bad_port = fx
            .server
            .setup(ServerSetup {
                port: 0,
                ..Default::default()
            })
            .await;
        assert!(matches!(bad_port, Err(ManagerError::Validation(_))));

        let bad_domain = fx
            .server
            .setup(ServerSetup {
                domain: Some("x/O=evil".to_string()),
                ..Default::default()
            })
            .await;
        assert!(matches!(bad_domain, Err(ManagerError::Validation(_))));
        assert!(fx.runner.invocations().is_empty());
    }

    #[tokio::test]
    async fn test_setup_refuses_unreadable_server_record() {
        let fx = fixture();
        std::fs::write(&fx.config.server_file, "{ \"listen_port\": ").unwrap();

        let err = fx.server.setup(ServerSetup::default()).await.unwrap_err();
        assert!(matches!(
            err,
            ManagerError::Persistence(hm_core::StoreError::Corrupt { .. })
        ));
        assert_eq!(
            std::fs::read_to_string(&fx.config.server_file).unwrap(),
            "{ \"listen_port\": "
        );
        assert!(!fx.config.server_config_path().exists());
        assert!(fx.controller.calls().is_empty());
    }

    #[tokio::test]
    async fn test_status_of_fresh_host() {
        let fx = fixture();
        fx.runner
            .respond("/usr/local/bin/hysteria version", ToolOutput::failed("No such file"));

        let status = fx.server.status().await;
        assert!(!status.installed);
        assert!(!status.configured);
        assert!(!status.running);
        assert_eq!(status.config.listen_port, 443);
    }
}
