//! OS service manager seam

use std::sync::Arc;

use async_trait::async_trait;
use hm_core::ToolError;

use super::exec::{CommandRunner, Invocation};

/// Operations on the OS service manager
#[async_trait]
pub trait SystemController: Send + Sync {
    /// Re-read unit descriptors from disk
    async fn daemon_reload(&self) -> Result<(), ToolError>;

    async fn enable(&self, unit: &str) -> Result<(), ToolError>;

    async fn disable(&self, unit: &str) -> Result<(), ToolError>;

    async fn start(&self, unit: &str) -> Result<(), ToolError>;

    async fn stop(&self, unit: &str) -> Result<(), ToolError>;

    async fn restart(&self, unit: &str) -> Result<(), ToolError>;

    /// Whether the unit is currently active. Query failures count as inactive.
    async fn is_active(&self, unit: &str) -> bool;
}

/// [`SystemController`] driving `systemctl`
pub struct Systemctl {
    runner: Arc<dyn CommandRunner>,
}

impl Systemctl {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    async fn systemctl(&self, args: &[&str]) -> Result<(), ToolError> {
        let invocation = Invocation::new("systemctl").args(args.iter().copied());
        self.runner.run_checked(&invocation).await.map(|_| ())
    }
}

#[async_trait]
impl SystemController for Systemctl {
    async fn daemon_reload(&self) -> Result<(), ToolError> {
        self.systemctl(&["daemon-reload"]).await
    }

    async fn enable(&self, unit: &str) -> Result<(), ToolError> {
        self.systemctl(&["enable", unit]).await
    }

    async fn disable(&self, unit: &str) -> Result<(), ToolError> {
        self.systemctl(&["disable", unit]).await
    }

    async fn start(&self, unit: &str) -> Result<(), ToolError> {
        self.systemctl(&["start", unit]).await
    }

    async fn stop(&self, unit: &str) -> Result<(), ToolError> {
        self.systemctl(&["stop", unit]).await
    }

    async fn restart(&self, unit: &str) -> Result<(), ToolError> {
        self.systemctl(&["restart", unit]).await
    }

    async fn is_active(&self, unit: &str) -> bool {
        let invocation = Invocation::new("systemctl").args(["is-active", unit]);
        match self.runner.run(&invocation).await {
            Ok(output) => output.success,
            Err(e) => {
                tracing::debug!("is-active query for {} failed: {}", unit, e);
                false
            }
        }
    }
}
