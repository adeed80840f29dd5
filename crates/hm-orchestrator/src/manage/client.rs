//! Client lifecycle
//!
//! `add` and `remove` both run their whole load-modify-save cycle under the
//! store writer lock. `add` journals every host change and unwinds it if any
//! later step fails, so a failed add leaves no config file, descriptor or
//! store entry behind.

use std::sync::Arc;

use hm_core::alloc::{self, CLIENT_PASSWORD_LEN, MIN_CUSTOM_PORT};
use hm_core::config::ManagerConfig;
use hm_core::render::{render_client_config, UnitSpec};
use hm_core::{ClientId, ClientMap, ClientRecord, ClientSnapshot, ConfigStore, ManagerError};
use serde::Serialize;

use super::rollback::Rollback;
use super::{password_or_generate, port_in_range, validate_host};
use crate::system::ServiceUnitManager;

/// Parameters of a new client
#[derive(Debug, Clone, Default)]
pub struct NewClient {
    pub remote_host: String,
    pub remote_port: i64,
    pub password: Option<String>,
    pub custom_port: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatedClient {
    pub client_id: ClientId,
    pub socks_port: u16,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RemovedClient {
    pub message: String,
}

/// Creates, removes and lists clients
pub struct ClientOrchestrator {
    config: Arc<ManagerConfig>,
    store: Arc<ConfigStore>,
    units: Arc<ServiceUnitManager>,
}

impl ClientOrchestrator {
    pub fn new(config: Arc<ManagerConfig>, store: Arc<ConfigStore>, units: Arc<ServiceUnitManager>) -> Self {
        Self {
            config,
            store,
            units,
        }
    }

    /// All stored clients
    pub fn clients(&self) -> ClientMap {
        self.store.load_clients().value
    }

    /// Stored clients with derived fields, not probed
    pub fn list(&self) -> Vec<ClientSnapshot> {
        self.clients()
            .iter()
            .map(|(id, record)| ClientSnapshot::unprobed(id, record))
            .collect()
    }

    /// Create a client, render its config, register and start its unit
    pub async fn add(&self, request: NewClient) -> Result<CreatedClient, ManagerError> {
        let remote_host = request.remote_host.trim().to_string();
        if remote_host.is_empty() {
            return Err(ManagerError::Validation("Server IP is required".to_string()));
        }
        validate_host(&remote_host)?;
        let remote_port = port_in_range(request.remote_port, 1, "Invalid server port")?;
        let custom_port = request
            .custom_port
            .map(|p| port_in_range(p, MIN_CUSTOM_PORT, "Custom port must be between 1024-65535"))
            .transpose()?;
        let password = password_or_generate(request.password.as_deref(), CLIENT_PASSWORD_LEN)?;

        let _guard = self.store.exclusive().await;
        let mut clients = self.store.clients_for_update()?;

        let socks_port = match custom_port {
            Some(port) if clients.values().any(|c| c.local_proxy_port == port) => {
                return Err(ManagerError::Conflict("Port already in use".to_string()));
            }
            Some(port) => port,
            None => alloc::next_available_port(clients.values().map(|c| c.local_proxy_port))?,
        };
        let id = alloc::next_client_id(clients.keys())?;

        let record = ClientRecord {
            display_name: format!("Client {} ({})", id, remote_host),
            remote_host,
            remote_port,
            local_proxy_port: socks_port,
            config_file: self.config.client_config_path(&id),
            password,
        };

        let mut rollback = Rollback::new();
        if let Err(e) = self.provision(&id, &record, &mut clients, &mut rollback).await {
            tracing::error!("Creating {} failed, rolling back: {}", id, e);
            rollback.unwind(&self.units).await;
            return Err(e);
        }
        rollback.commit();

        tracing::info!("Created {} on SOCKS5 port {}", id, socks_port);
        Ok(CreatedClient {
            message: format!("Client {} created successfully", id),
            client_id: id,
            socks_port,
        })
    }

    async fn provision(
        &self,
        id: &ClientId,
        record: &ClientRecord,
        clients: &mut ClientMap,
        rollback: &mut Rollback,
    ) -> Result<(), ManagerError> {
        let service = id.service_name();

        rollback.track_write(&record.config_file).await?;
        if let Some(parent) = record.config_file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let rendered = render_client_config(
            &record.remote_host,
            record.remote_port,
            record.local_proxy_port,
            &record.password,
        );
        tokio::fs::write(&record.config_file, rendered).await?;

        let was_registered = self.units.is_registered(&service).await;
        rollback.track_write(&self.units.unit_path(&service)).await?;
        let spec = UnitSpec::client(&self.config.binary_path, &record.config_file, id.as_str());
        self.units.write_descriptor(&service, &spec).await?;
        if was_registered {
            // A leftover unit may still be running the old config
            self.units.reactivate(&service).await?;
        } else {
            rollback.track_activation(&service);
            self.units.activate(&service).await?;
        }

        clients.insert(id.clone(), record.clone());
        self.store.save_clients(clients)?;
        Ok(())
    }

    /// Stop and delete a client. Protected ids are refused untouched.
    pub async fn remove(&self, id: &ClientId) -> Result<RemovedClient, ManagerError> {
        if self.config.is_protected(id) {
            tracing::warn!("Refusing to remove protected client {}", id);
            return Err(ManagerError::Protected(id.clone()));
        }

        let _guard = self.store.exclusive().await;
        let mut clients = self.store.clients_for_update()?;
        let record = clients
            .remove(id)
            .ok_or_else(|| ManagerError::NotFound(format!("Client {}", id)))?;

        self.units.remove(&id.service_name(), &record.config_file).await;
        self.store.save_clients(&clients)?;

        tracing::info!("Removed {}", id);
        Ok(RemovedClient {
            message: format!("Client {} removed successfully", id),
        })
    }
}
