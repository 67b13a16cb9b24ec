//! Container runtime abstraction

use async_trait::async_trait;
use stage_foundation::Result;
use std::collections::HashMap;

/// Bind mount (host path into container path)
#[derive(Debug, Clone, Default)]
pub struct Mount {
    pub source: String,
    pub target: String,
    pub read_only: bool,
}

/// Options for creating a container
#[derive(Debug, Clone, Default)]
pub struct CreateOpts {
    /// Container name
    pub name: String,
    /// Container image
    pub image: String,
    /// Command to run (image default when empty)
    pub cmd: Vec<String>,
    /// Environment variables as KEY=VALUE pairs
    pub env: Vec<String>,
    /// Labels
    pub labels: HashMap<String, String>,
    /// CPU limit in units of 1e-9 cores (0 = unlimited)
    pub nano_cpus: i64,
    /// Memory limit in bytes (0 = unlimited)
    pub memory: i64,
    /// Volume mounts
    pub mounts: Vec<Mount>,
}

/// Coarse container state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerStatus {
    Running,
    Stopped,
    /// The container does not exist. This is a normal outcome, not an
    /// error: callers routinely probe containers that were never created.
    NotFound,
}

impl ContainerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerStatus::Running => "running",
            ContainerStatus::Stopped => "stopped",
            ContainerStatus::NotFound => "not-found",
        }
    }
}

impl std::fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current state of a container
#[derive(Debug, Clone, Copy)]
pub struct ContainerState {
    pub status: ContainerStatus,
    pub exit_code: i64,
}

impl ContainerState {
    /// Status label for a project that has no container yet.
    pub const NOT_CREATED: &'static str = "not-created";
}

/// Point-in-time resource usage for a running container
#[derive(Debug, Clone, Copy, Default)]
pub struct ContainerStats {
    pub cpu_percent: f64,
    pub mem_usage: u64,
    pub mem_limit: u64,
}

/// Abstraction over container lifecycle and process execution.
///
/// One concrete adapter talks to the Docker Engine API; tests substitute
/// in-memory fakes. All operations are cancellable by dropping the future
/// or racing it against a timeout.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Builds a new container from opts without starting it. Returns the
    /// container id.
    async fn create(&self, opts: CreateOpts) -> Result<String>;

    /// Starts a previously created container.
    async fn start(&self, container_id: &str) -> Result<()>;

    /// Gracefully stops a running container, escalating to SIGKILL after
    /// `timeout_secs`.
    async fn stop(&self, container_id: &str, timeout_secs: i64) -> Result<()>;

    /// Deletes a container. If `force`, a running container is killed first.
    async fn remove(&self, container_id: &str, force: bool) -> Result<()>;

    /// Returns the current state of a container. A missing container maps
    /// to [`ContainerStatus::NotFound`], never an error.
    async fn status(&self, container_id: &str) -> Result<ContainerState>;

    /// Returns point-in-time resource usage for a running container.
    async fn stats(&self, container_id: &str) -> Result<ContainerStats>;

    /// Runs `cmd` inside a running container, optionally piping `stdin`,
    /// and returns the combined stdout+stderr output (stdout first, stderr
    /// appended) along with the process exit code.
    async fn exec(
        &self,
        container_id: &str,
        cmd: Vec<String>,
        stdin: Option<Vec<u8>>,
    ) -> Result<(Vec<u8>, i64)>;
}

/// Canonical container name for a project's sandbox.
pub fn container_name_for_project(project: &str) -> String {
    format!("sandbox-{}", project)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_name_for_project() {
        assert_eq!(container_name_for_project("api-service"), "sandbox-api-service");
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(ContainerStatus::Running.as_str(), "running");
        assert_eq!(ContainerStatus::NotFound.as_str(), "not-found");
        assert_eq!(ContainerState::NOT_CREATED, "not-created");
    }
}
