//! Liveness of proxy instances
//!
//! A client is online iff its unit is active *and* its SOCKS5 port accepts a
//! connection. Probes run serially, so a status query costs up to
//! `clients × probe_timeout` when everything is down.

pub mod host;
pub mod probe;

use std::sync::Arc;

use hm_core::{ClientId, ClientMap, ClientRecord, ClientSnapshot, ClientStatus};

use crate::system::SystemController;

pub use host::SystemInfo;
pub use probe::NetworkProbe;

/// Classifies clients as online or offline
pub struct HealthMonitor {
    controller: Arc<dyn SystemController>,
    probe: Arc<NetworkProbe>,
}

impl HealthMonitor {
    pub fn new(controller: Arc<dyn SystemController>, probe: Arc<NetworkProbe>) -> Self {
        Self { controller, probe }
    }

    /// Probe one client
    pub async fn client_status(&self, id: &ClientId, record: &ClientRecord) -> ClientStatus {
        let active = self.controller.is_active(&id.service_name()).await;
        // Skip the connect attempt when the verdict is already known
        if !active {
            return ClientStatus::Offline;
        }
        if self.probe.tcp_reachable(record.local_proxy_port).await {
            ClientStatus::Online
        } else {
            ClientStatus::Offline
        }
    }

    /// Probe every client, in id order
    pub async fn status_of(&self, clients: &ClientMap) -> Vec<ClientSnapshot> {
        let mut snapshots = Vec::with_capacity(clients.len());
        for (id, record) in clients {
            let mut snapshot = ClientSnapshot::unprobed(id, record);
            snapshot.status = self.client_status(id, record).await;
            tracing::trace!("{} is {}", id, snapshot.status);
            snapshots.push(snapshot);
        }
        snapshots
    }
}
