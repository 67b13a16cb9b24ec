//! Command execution inside project containers
//!
//! `Executor` is the narrow surface the orchestrator needs: a health probe
//! and a run-command-collect-output call. `SessionLauncher` layers the tmux
//! session conventions on top of it.

use crate::runtime::{ContainerRuntime, ContainerStatus};
use async_trait::async_trait;
use stage_foundation::{Error, Result};
use std::sync::Arc;
use tracing::debug;

/// Runs commands inside a named container.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Whether the container exists and is running.
    async fn is_healthy(&self, container: &str) -> bool;

    /// Runs a command to completion and returns its combined output.
    /// A non-zero exit code is an error.
    async fn exec(&self, container: &str, cmd: Vec<String>) -> Result<String>;
}

/// Executor backed by a container runtime.
pub struct RuntimeExecutor {
    runtime: Arc<dyn ContainerRuntime>,
}

impl RuntimeExecutor {
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self { runtime }
    }
}

#[async_trait]
impl Executor for RuntimeExecutor {
    async fn is_healthy(&self, container: &str) -> bool {
        match self.runtime.status(container).await {
            Ok(state) => state.status == ContainerStatus::Running,
            Err(_) => false,
        }
    }

    async fn exec(&self, container: &str, cmd: Vec<String>) -> Result<String> {
        let (output, exit_code) = self.runtime.exec(container, cmd, None).await?;
        let text = String::from_utf8_lossy(&output).into_owned();
        if exit_code != 0 {
            return Err(Error::Container(format!(
                "command exited {} in {:?}: {}",
                exit_code,
                container,
                text.trim()
            )));
        }
        Ok(text)
    }
}

/// Number of log lines a preview snapshot returns.
const PREVIEW_LINES: usize = 50;

/// Manages the detached tmux sessions that back agent tasks.
///
/// One session per task, named `agent-<taskID>`, with pane output piped to
/// `/tmp/<session>.log` so previews can read it without attaching.
pub struct SessionLauncher {
    executor: Arc<dyn Executor>,
}

impl SessionLauncher {
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        Self { executor }
    }

    /// The session name backing a task.
    pub fn session_name(task_id: &str) -> String {
        format!("agent-{}", task_id)
    }

    fn log_path(session: &str) -> String {
        format!("/tmp/{}.log", session)
    }

    /// Creates the detached session for a task and starts piping its pane
    /// output to the session log. Returns the session name.
    pub async fn launch(&self, container: &str, task_id: &str) -> Result<String> {
        let session = Self::session_name(task_id);

        self.executor
            .exec(
                container,
                vec![
                    "tmux".into(),
                    "new-session".into(),
                    "-d".into(),
                    "-s".into(),
                    session.clone(),
                ],
            )
            .await?;

        self.executor
            .exec(
                container,
                vec![
                    "tmux".into(),
                    "pipe-pane".into(),
                    "-o".into(),
                    "-t".into(),
                    session.clone(),
                    format!("cat >> {}", Self::log_path(&session)),
                ],
            )
            .await?;

        debug!(container, session = %session, "session launched");
        Ok(session)
    }

    /// Types text into the session followed by Enter.
    pub async fn send_input(&self, container: &str, session: &str, text: &str) -> Result<()> {
        self.executor
            .exec(
                container,
                vec![
                    "tmux".into(),
                    "send-keys".into(),
                    "-t".into(),
                    session.to_string(),
                    text.to_string(),
                    "Enter".into(),
                ],
            )
            .await?;
        Ok(())
    }

    /// One snapshot of the tail of the session log.
    pub async fn preview(&self, container: &str, session: &str) -> Result<String> {
        self.executor
            .exec(
                container,
                vec![
                    "tail".into(),
                    "-n".into(),
                    PREVIEW_LINES.to_string(),
                    Self::log_path(session),
                ],
            )
            .await
    }
}
