//! Manager state shared by all request handlers

use std::sync::Arc;

use hm_core::config::ManagerConfig;
use hm_core::{ClientId, ConfigStore, ManagerError};
use tokio_util::sync::CancellationToken;

use crate::health::{HealthMonitor, NetworkProbe};
use crate::logs::LogStreamer;
use crate::manage::{ClientOrchestrator, ServerOrchestrator};
use crate::provision::{BinaryInstaller, CertificateProvisioner};
use crate::system::{CommandRunner, ServiceUnitManager, SystemController, Systemctl, TokioRunner};

/// Everything a handler needs, built once at startup
pub struct ManagerState {
    /// Configuration
    pub config: Arc<ManagerConfig>,
    /// Persisted records
    pub store: Arc<ConfigStore>,
    /// Service manager
    pub controller: Arc<dyn SystemController>,
    pub clients: ClientOrchestrator,
    pub server: ServerOrchestrator,
    pub health: HealthMonitor,
    pub logs: LogStreamer,
    /// Cancelled on shutdown; live tails hang off it
    pub shutdown: CancellationToken,
}

impl ManagerState {
    /// State backed by `systemctl` and real subprocesses
    pub fn new(config: ManagerConfig) -> Self {
        let runner: Arc<dyn CommandRunner> = Arc::new(TokioRunner);
        let controller: Arc<dyn SystemController> = Arc::new(Systemctl::new(runner.clone()));
        Self::with_backends(config, controller, runner)
    }

    /// State with explicit system backends
    pub fn with_backends(
        config: ManagerConfig,
        controller: Arc<dyn SystemController>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        let config = Arc::new(config);
        let store = Arc::new(ConfigStore::new(
            config.clients_file.clone(),
            config.server_file.clone(),
            config.seed_clients.clone(),
        ));
        let units = Arc::new(ServiceUnitManager::new(config.unit_dir.clone(), controller.clone()));
        let probe = Arc::new(NetworkProbe::new(
            config.public_ip_endpoints.clone(),
            config.public_ip_timeout,
            config.probe_timeout,
        ));

        let certs = CertificateProvisioner::new(config.cert_dir(), runner.clone());
        let installer = BinaryInstaller::new(config.binary_path.clone(), config.install_timeout, runner);

        Self {
            clients: ClientOrchestrator::new(config.clone(), store.clone(), units.clone()),
            server: ServerOrchestrator::new(config.clone(), store.clone(), units, certs, installer, probe.clone()),
            health: HealthMonitor::new(controller.clone(), probe),
            logs: LogStreamer::new(
                config.log_file.clone(),
                config.max_log_lines,
                config.default_log_lines,
                config.tail_poll_interval,
            ),
            shutdown: CancellationToken::new(),
            controller,
            store,
            config,
        }
    }

    /// Use `token` as the shutdown signal
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// Unit behind a restart target: `monitor`, `server` or a known client id
    pub fn restart_unit(&self, target: &str) -> Option<String> {
        match target {
            "monitor" => Some(self.config.monitor_service.clone()),
            "server" => Some(self.config.server_service.clone()),
            id => {
                let id = ClientId::new(id);
                self.clients
                    .clients()
                    .contains_key(&id)
                    .then(|| id.service_name())
            }
        }
    }

    /// Restart a target's unit
    pub async fn restart(&self, target: &str) -> Result<String, ManagerError> {
        let unit = self
            .restart_unit(target)
            .ok_or_else(|| ManagerError::Validation("Invalid client".to_string()))?;

        if let Err(e) = self.controller.restart(&unit).await {
            tracing::error!("Restarting {} failed: {}", unit, e);
            return Err(e.into());
        }
        tracing::info!("Restarted {}", unit);
        Ok(format!("{} restarted successfully", unit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ControllerCall, FakeController, ScriptedRunner};
    use tempfile::TempDir;

    fn state(dir: &TempDir, controller: Arc<FakeController>) -> ManagerState {
        let config = ManagerConfig {
            clients_file: dir.path().join("clients.json"),
            server_file: dir.path().join("server.json"),
            ..Default::default()
        };
        ManagerState::with_backends(config, controller, Arc::new(ScriptedRunner::new()))
    }

    #[test]
    fn test_restart_targets() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir, Arc::new(FakeController::new()));

        assert_eq!(state.restart_unit("monitor").as_deref(), Some("hysteria-monitor"));
        assert_eq!(state.restart_unit("server").as_deref(), Some("hysteria-server"));
        assert_eq!(state.restart_unit("client2").as_deref(), Some("hysteria-client2"));
        assert_eq!(state.restart_unit("client77"), None);
    }

    #[tokio::test]
    async fn test_restart_calls_controller() {
        let dir = TempDir::new().unwrap();
        let controller = Arc::new(FakeController::new());
        let state = state(&dir, controller.clone());

        let message = state.restart("server").await.unwrap();
        assert_eq!(message, "hysteria-server restarted successfully");
        assert_eq!(
            controller.calls(),
            vec![ControllerCall::Restart("hysteria-server".to_string())]
        );

        assert!(matches!(
            state.restart("nonsense").await,
            Err(ManagerError::Validation(_))
        ));
    }
}
