//! Service unit lifecycle

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use hm_core::render::UnitSpec;
use hm_core::ManagerError;

use super::controller::SystemController;

/// Writes service descriptors and drives their activation
pub struct ServiceUnitManager {
    unit_dir: PathBuf,
    controller: Arc<dyn SystemController>,
}

impl ServiceUnitManager {
    pub fn new(unit_dir: PathBuf, controller: Arc<dyn SystemController>) -> Self {
        Self {
            unit_dir,
            controller,
        }
    }

    /// Descriptor path for a unit
    pub fn unit_path(&self, name: &str) -> PathBuf {
        self.unit_dir.join(format!("{}.service", name))
    }

    pub fn unit_dir(&self) -> &Path {
        &self.unit_dir
    }

    pub fn controller(&self) -> &Arc<dyn SystemController> {
        &self.controller
    }

    /// Whether a descriptor exists for the unit
    pub async fn is_registered(&self, name: &str) -> bool {
        tokio::fs::try_exists(self.unit_path(name))
            .await
            .unwrap_or(false)
    }

    /// Write the descriptor, then reload, enable and start the unit.
    ///
    /// Failures propagate; files already written stay in place so the caller
    /// can decide how to compensate.
    pub async fn install(&self, name: &str, spec: &UnitSpec) -> Result<(), ManagerError> {
        self.write_descriptor(name, spec).await?;
        self.activate(name).await
    }

    /// Write `<unit_dir>/<name>.service`
    pub async fn write_descriptor(&self, name: &str, spec: &UnitSpec) -> io::Result<PathBuf> {
        let path = self.unit_path(name);
        tokio::fs::create_dir_all(&self.unit_dir).await?;
        tokio::fs::write(&path, spec.render()).await?;
        tracing::debug!("Wrote unit descriptor {:?}", path);
        Ok(path)
    }

    /// Reload, enable and start an already written unit
    pub async fn activate(&self, name: &str) -> Result<(), ManagerError> {
        self.controller.daemon_reload().await.map_err(log_tool_error)?;
        self.controller.enable(name).await.map_err(log_tool_error)?;
        self.controller.start(name).await.map_err(log_tool_error)?;
        tracing::info!("Started {}", name);
        Ok(())
    }

    /// Reload, enable and restart a unit that was already registered
    pub async fn reactivate(&self, name: &str) -> Result<(), ManagerError> {
        self.controller.daemon_reload().await.map_err(log_tool_error)?;
        self.controller.enable(name).await.map_err(log_tool_error)?;
        self.controller.restart(name).await.map_err(log_tool_error)?;
        tracing::info!("Restarted {}", name);
        Ok(())
    }

    /// Stop and disable a unit, ignoring failures
    pub async fn deactivate(&self, name: &str) {
        if let Err(e) = self.controller.stop(name).await {
            tracing::warn!("Stopping {} failed: {}", name, e);
        }
        if let Err(e) = self.controller.disable(name).await {
            tracing::warn!("Disabling {} failed: {}", name, e);
        }
    }

    /// Stop and disable the unit, then delete its descriptor and `config_file`.
    ///
    /// Nothing here fails the caller: every error is logged and skipped so
    /// bookkeeping can still drop the unit.
    pub async fn remove(&self, name: &str, config_file: &Path) {
        self.deactivate(name).await;

        for path in [config_file.to_path_buf(), self.unit_path(name)] {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => tracing::debug!("Removed {:?}", path),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!("Failed to remove {:?}: {}", path, e),
            }
        }

        if let Err(e) = self.controller.daemon_reload().await {
            tracing::warn!("daemon-reload after removing {} failed: {}", name, e);
        }
    }
}

fn log_tool_error(err: hm_core::ToolError) -> ManagerError {
    tracing::error!("Service manager call failed: {}", err);
    ManagerError::Tool(err)
}
