//! Compensating actions for multi-step orchestration
//!
//! Each step that changes the host is recorded before it runs. On failure
//! the recorded steps are undone in reverse order; on success the record is
//! simply dropped via [`Rollback::commit`].

use std::io;
use std::path::{Path, PathBuf};

use crate::system::ServiceUnitManager;

#[derive(Debug)]
enum Undo {
    /// File did not exist before
    RemoveFile(PathBuf),
    /// File existed with these contents
    RestoreFile { path: PathBuf, contents: Vec<u8> },
    /// Unit was not registered before
    Deactivate(String),
}

/// Journal of completed steps
#[derive(Debug, Default)]
pub struct Rollback {
    steps: Vec<Undo>,
}

impl Rollback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot `path` before it is written
    pub async fn track_write(&mut self, path: &Path) -> io::Result<()> {
        let undo = match tokio::fs::read(path).await {
            Ok(contents) => Undo::RestoreFile {
                path: path.to_path_buf(),
                contents,
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => Undo::RemoveFile(path.to_path_buf()),
            Err(e) => return Err(e),
        };
        self.steps.push(undo);
        Ok(())
    }

    /// Record that `unit` is about to be enabled and started
    pub fn track_activation(&mut self, unit: &str) {
        self.steps.push(Undo::Deactivate(unit.to_string()));
    }

    /// Keep every change
    pub fn commit(self) {}

    /// Undo every recorded step, newest first. Failures are logged.
    pub async fn unwind(self, units: &ServiceUnitManager) {
        let mut touched_units = false;

        for step in self.steps.into_iter().rev() {
            match step {
                Undo::Deactivate(unit) => {
                    tracing::info!("Rolling back activation of {}", unit);
                    units.deactivate(&unit).await;
                    touched_units = true;
                }
                Undo::RemoveFile(path) => {
                    touched_units |= path.starts_with(units.unit_dir());
                    match tokio::fs::remove_file(&path).await {
                        Ok(()) => tracing::info!("Rolled back {:?}", path),
                        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                        Err(e) => tracing::warn!("Failed to remove {:?} during rollback: {}", path, e),
                    }
                }
                Undo::RestoreFile { path, contents } => {
                    touched_units |= path.starts_with(units.unit_dir());
                    match tokio::fs::write(&path, contents).await {
                        Ok(()) => tracing::info!("Restored {:?}", path),
                        Err(e) => tracing::warn!("Failed to restore {:?} during rollback: {}", path, e),
                    }
                }
            }
        }

        if touched_units {
            if let Err(e) = units.controller().daemon_reload().await {
                tracing::warn!("daemon-reload during rollback failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ControllerCall, FakeController};
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_unwind_restores_and_removes() {
        let dir = TempDir::new().unwrap();
        let controller = Arc::new(FakeController::new());
        let units = ServiceUnitManager::new(dir.path().join("units"), controller.clone());

        let existing = dir.path().join("server.yaml");
        let created = dir.path().join("client5.yaml");
        std::fs::write(&existing, "old").unwrap();

        let mut rollback = Rollback::new();
        rollback.track_write(&existing).await.unwrap();
        std::fs::write(&existing, "new").unwrap();
        rollback.track_write(&created).await.unwrap();
        std::fs::write(&created, "fresh").unwrap();

        rollback.unwind(&units).await;

        assert_eq!(std::fs::read_to_string(&existing).unwrap(), "old");
        assert!(!created.exists());
        assert!(controller.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unwind_deactivates_then_reloads() {
        let dir = TempDir::new().unwrap();
        let controller = Arc::new(FakeController::new());
        let units = ServiceUnitManager::new(dir.path().to_path_buf(), controller.clone());

        let unit_file = units.unit_path("hysteria-client5");
        let mut rollback = Rollback::new();
        rollback.track_write(&unit_file).await.unwrap();
        std::fs::write(&unit_file, "[Unit]").unwrap();
        rollback.track_activation("hysteria-client5");

        rollback.unwind(&units).await;

        assert!(!unit_file.exists());
        assert_eq!(
            controller.calls(),
            vec![
                ControllerCall::Stop("hysteria-client5".to_string()),
                ControllerCall::Disable("hysteria-client5".to_string()),
                ControllerCall::DaemonReload,
            ]
        );
    }

    #[tokio::test]
    async fn test_commit_keeps_changes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("client6.yaml");

        let mut rollback = Rollback::new();
        rollback.track_write(&path).await.unwrap();
        std::fs::write(&path, "kept").unwrap();
        rollback.commit();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "kept");
    }
}
