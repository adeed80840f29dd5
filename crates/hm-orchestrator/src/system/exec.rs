//! External program execution

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use hm_core::ToolError;

/// A program invocation: argv, extra environment and an optional time budget
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub timeout: Option<Duration>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }

    /// `program arg1 arg2`, for logs
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// What a finished program produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub success: bool,
    /// Exit status as printed by the OS (`exit status: 1`)
    pub status: String,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    /// Successful output with the given stdout
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            status: "exit status: 0".to_string(),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Failed output with the given stderr
    pub fn failed(stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            status: "exit status: 1".to_string(),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Turn a non-zero exit into [`ToolError::Failed`]
    pub fn check(self, program: &str) -> Result<Self, ToolError> {
        if self.success {
            return Ok(self);
        }
        let diagnostic = if self.stderr.trim().is_empty() {
            self.stdout.trim().to_string()
        } else {
            self.stderr.trim().to_string()
        };
        Err(ToolError::Failed {
            program: program.to_string(),
            status: self.status,
            diagnostic,
        })
    }
}

/// Runs external programs
///
/// `run` only fails when the program could not be started or ran out of
/// time. A non-zero exit is reported through [`ToolOutput::success`].
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, invocation: &Invocation) -> Result<ToolOutput, ToolError>;

    /// Run and treat a non-zero exit as an error
    async fn run_checked(&self, invocation: &Invocation) -> Result<ToolOutput, ToolError> {
        let output = self.run(invocation).await?;
        output.check(&invocation.program)
    }
}

/// [`CommandRunner`] backed by `tokio::process`
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioRunner;

#[async_trait]
impl CommandRunner for TokioRunner {
    async fn run(&self, invocation: &Invocation) -> Result<ToolOutput, ToolError> {
        tracing::debug!("Running {}", invocation.command_line());

        let mut command = tokio::process::Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .envs(invocation.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            // A timed-out child is killed when the future is dropped
            .kill_on_drop(true);

        let pending = command.output();
        let result = match invocation.timeout {
            Some(limit) => match tokio::time::timeout(limit, pending).await {
                Ok(result) => result,
                Err(_) => {
                    return Err(ToolError::TimedOut {
                        program: invocation.program.clone(),
                        after: limit,
                    })
                }
            },
            None => pending.await,
        };

        let output = result.map_err(|source| ToolError::Spawn {
            program: invocation.program.clone(),
            source,
        })?;

        Ok(ToolOutput {
            success: output.status.success(),
            status: output.status.to_string(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invocation_builder() {
        let inv = Invocation::new("systemctl")
            .arg("is-active")
            .args(["hysteria-server"])
            .env("LANG", "C")
            .timeout(Duration::from_secs(3));
        assert_eq!(inv.command_line(), "systemctl is-active hysteria-server");
        assert_eq!(inv.env, vec![("LANG".to_string(), "C".to_string())]);
        assert_eq!(inv.timeout, Some(Duration::from_secs(3)));
    }

    #[test]
    fn test_check_prefers_stderr() {
        let err = ToolOutput {
            success: false,
            status: "exit status: 2".to_string(),
            stdout: "partial".to_string(),
            stderr: "  boom \n".to_string(),
        }
        .check("openssl")
        .unwrap_err();

        match err {
            ToolError::Failed {
                program,
                status,
                diagnostic,
            } => {
                assert_eq!(program, "openssl");
                assert_eq!(status, "exit status: 2");
                assert_eq!(diagnostic, "boom");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_check_passes_success() {
        assert!(ToolOutput::ok("active\n").check("systemctl").is_ok());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_tokio_runner_captures_output() {
        let output = TokioRunner
            .run(&Invocation::new("sh").args(["-c", "echo out; echo err >&2; exit 3"]))
            .await
            .unwrap();
        assert!(!output.success);
        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "err\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_tokio_runner_times_out() {
        let err = TokioRunner
            .run(&Invocation::new("sleep").arg("5").timeout(Duration::from_millis(50)))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::TimedOut { .. }));
    }

    #[tokio::test]
    async fn test_tokio_runner_reports_spawn_failure() {
        let err = TokioRunner
            .run(&Invocation::new("/nonexistent/definitely-not-a-binary"))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Spawn { .. }));
    }
}
