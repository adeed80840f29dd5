//! In-process fakes for the system seams
//!
//! Used by this crate's unit and integration tests. Nothing here touches the
//! real service manager or spawns processes.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use hm_core::ToolError;

use crate::system::{CommandRunner, Invocation, SystemController, ToolOutput};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A recorded service manager call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerCall {
    DaemonReload,
    Enable(String),
    Disable(String),
    Start(String),
    Stop(String),
    Restart(String),
}

impl ControllerCall {
    fn op(&self) -> &'static str {
        match self {
            ControllerCall::DaemonReload => "daemon-reload",
            ControllerCall::Enable(_) => "enable",
            ControllerCall::Disable(_) => "disable",
            ControllerCall::Start(_) => "start",
            ControllerCall::Stop(_) => "stop",
            ControllerCall::Restart(_) => "restart",
        }
    }
}

/// [`SystemController`] that records calls and tracks active units in memory
#[derive(Default)]
pub struct FakeController {
    calls: Mutex<Vec<ControllerCall>>,
    failing: Mutex<HashSet<String>>,
    active: Mutex<HashSet<String>>,
}

impl FakeController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call of `op` (`start`, `daemon-reload`, ...) fail
    pub fn fail_on(&self, op: &str) {
        lock(&self.failing).insert(op.to_string());
    }

    /// Mark a unit active or inactive
    pub fn set_active(&self, unit: &str, active: bool) {
        let mut set = lock(&self.active);
        if active {
            set.insert(unit.to_string());
        } else {
            set.remove(unit);
        }
    }

    /// Calls made so far, in order (`is_active` queries are not recorded)
    pub fn calls(&self) -> Vec<ControllerCall> {
        lock(&self.calls).clone()
    }

    fn record(&self, call: ControllerCall) -> Result<(), ToolError> {
        let op = call.op();
        lock(&self.calls).push(call);
        if lock(&self.failing).contains(op) {
            return Err(ToolError::Failed {
                program: "systemctl".to_string(),
                status: "exit status: 1".to_string(),
                diagnostic: format!("injected {} failure", op),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl SystemController for FakeController {
    async fn daemon_reload(&self) -> Result<(), ToolError> {
        self.record(ControllerCall::DaemonReload)
    }

    async fn enable(&self, unit: &str) -> Result<(), ToolError> {
        self.record(ControllerCall::Enable(unit.to_string()))
    }

    async fn disable(&self, unit: &str) -> Result<(), ToolError> {
        self.record(ControllerCall::Disable(unit.to_string()))
    }

    async fn start(&self, unit: &str) -> Result<(), ToolError> {
        self.record(ControllerCall::Start(unit.to_string()))?;
        self.set_active(unit, true);
        Ok(())
    }

    async fn stop(&self, unit: &str) -> Result<(), ToolError> {
        self.record(ControllerCall::Stop(unit.to_string()))?;
        self.set_active(unit, false);
        Ok(())
    }

    async fn restart(&self, unit: &str) -> Result<(), ToolError> {
        self.record(ControllerCall::Restart(unit.to_string()))?;
        self.set_active(unit, true);
        Ok(())
    }

    async fn is_active(&self, unit: &str) -> bool {
        lock(&self.active).contains(unit)
    }
}

type Effect = Arc<dyn Fn(&Invocation) -> ToolOutput + Send + Sync>;

#[derive(Clone)]
enum Scripted {
    Output(ToolOutput),
    TimedOut,
    Effect(Effect),
}

/// [`CommandRunner`] answering from a script keyed by command-line prefix.
///
/// Unmatched invocations succeed with empty output. When several prefixes
/// match, the most recently registered one wins.
#[derive(Default)]
pub struct ScriptedRunner {
    invocations: Mutex<Vec<Invocation>>,
    script: Mutex<Vec<(String, Scripted)>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer invocations starting with `prefix` with `output`
    pub fn respond(&self, prefix: &str, output: ToolOutput) {
        lock(&self.script).push((prefix.to_string(), Scripted::Output(output)));
    }

    /// Report a timeout for invocations starting with `prefix`
    pub fn time_out(&self, prefix: &str) {
        lock(&self.script).push((prefix.to_string(), Scripted::TimedOut));
    }

    /// Run `effect` for invocations starting with `prefix`
    pub fn respond_with<F>(&self, prefix: &str, effect: F)
    where
        F: Fn(&Invocation) -> ToolOutput + Send + Sync + 'static,
    {
        lock(&self.script).push((prefix.to_string(), Scripted::Effect(Arc::new(effect))));
    }

    /// Every invocation received, in order
    pub fn invocations(&self) -> Vec<Invocation> {
        lock(&self.invocations).clone()
    }

    /// Command lines received, in order
    pub fn command_lines(&self) -> Vec<String> {
        lock(&self.invocations)
            .iter()
            .map(Invocation::command_line)
            .collect()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, invocation: &Invocation) -> Result<ToolOutput, ToolError> {
        lock(&self.invocations).push(invocation.clone());

        let line = invocation.command_line();
        let scripted = lock(&self.script)
            .iter()
            .rev()
            .find(|(prefix, _)| line.starts_with(prefix.as_str()))
            .map(|(_, scripted)| scripted.clone());

        match scripted {
            None => Ok(ToolOutput::ok("")),
            Some(Scripted::Output(output)) => Ok(output),
            Some(Scripted::Effect(effect)) => Ok(effect(invocation)),
            Some(Scripted::TimedOut) => Err(ToolError::TimedOut {
                program: invocation.program.clone(),
                after: invocation.timeout.unwrap_or(Duration::ZERO),
            }),
        }
    }
}
