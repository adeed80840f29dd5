//! Hysteria2 binary installation

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use hm_core::ToolError;

use crate::system::{CommandRunner, Invocation};

/// Upstream install script, piped to bash
pub const INSTALL_SCRIPT: &str = "curl -fsSL https://get.hy2.sh/ | bash";

/// PATH the install script runs with
const INSTALL_PATH: &str = "/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin";

/// Checks for and installs the proxy binary
pub struct BinaryInstaller {
    binary: PathBuf,
    timeout: Duration,
    runner: Arc<dyn CommandRunner>,
}

impl BinaryInstaller {
    pub fn new(binary: PathBuf, timeout: Duration, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            binary,
            timeout,
            runner,
        }
    }

    /// `<binary> version` exits 0
    pub async fn is_installed(&self) -> bool {
        let invocation = Invocation::new(self.binary.display().to_string()).arg("version");
        match self.runner.run(&invocation).await {
            Ok(output) => output.success,
            Err(e) => {
                tracing::debug!("Hysteria2 binary not usable: {}", e);
                false
            }
        }
    }

    /// Run the upstream install script. No retry on failure or timeout.
    pub async fn install(&self) -> Result<(), ToolError> {
        tracing::info!("Installing Hysteria2 (timeout {:?})", self.timeout);
        let invocation = Invocation::new("bash")
            .args(["-c", INSTALL_SCRIPT])
            .env("PATH", INSTALL_PATH)
            .timeout(self.timeout);

        match self.runner.run_checked(&invocation).await {
            Ok(_) => {
                tracing::info!("Hysteria2 installed");
                Ok(())
            }
            Err(e) => {
                tracing::error!("Hysteria2 installation failed: {}", e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::ToolOutput;
    use crate::testing::ScriptedRunner;

    fn installer(runner: Arc<ScriptedRunner>) -> BinaryInstaller {
        BinaryInstaller::new(
            PathBuf::from("/usr/local/bin/hysteria"),
            Duration::from_secs(300),
            runner,
        )
    }

    #[tokio::test]
    async fn test_is_installed_checks_version() {
        let runner = Arc::new(ScriptedRunner::new());
        assert!(installer(runner.clone()).is_installed().await);
        assert_eq!(runner.command_lines(), vec!["/usr/local/bin/hysteria version"]);

        runner.respond("/usr/local/bin/hysteria", ToolOutput::failed("not found"));
        assert!(!installer(runner).is_installed().await);
    }

    #[tokio::test]
    async fn test_install_invocation() {
        let runner = Arc::new(ScriptedRunner::new());
        installer(runner.clone()).install().await.unwrap();

        let inv = &runner.invocations()[0];
        assert_eq!(inv.program, "bash");
        assert_eq!(inv.args, vec!["-c".to_string(), INSTALL_SCRIPT.to_string()]);
        assert_eq!(inv.timeout, Some(Duration::from_secs(300)));
        assert!(inv.env.iter().any(|(k, _)| k == "PATH"));
    }

    #[tokio::test]
    async fn test_install_timeout_is_hard_failure() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.time_out("bash");
        let err = installer(runner.clone()).install().await.unwrap_err();
        assert!(matches!(err, ToolError::TimedOut { .. }));
        assert_eq!(runner.invocations().len(), 1);
    }
}
