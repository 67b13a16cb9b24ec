//! Docker adapter for the container runtime abstraction
//!
//! Talks to the local Docker Engine API via bollard. Container-not-found
//! on inspect is a normal status outcome; every other failure is wrapped
//! with the failing operation and container id.

use crate::runtime::{
    ContainerRuntime, ContainerState, ContainerStats, ContainerStatus, CreateOpts,
};
use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, LogOutput, RemoveContainerOptions,
    StartContainerOptions, StatsOptions, StopContainerOptions,
};
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::models::{HostConfig, Mount as DockerMount, MountTypeEnum};
use bollard::Docker;
use futures::StreamExt;
use stage_foundation::{Error, Result};
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Container runtime backed by the Docker Engine API.
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connects to the local Docker daemon using environment-based
    /// configuration (DOCKER_HOST, etc.).
    pub fn new() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| Error::Container(format!("docker client: {}", e)))?;
        Ok(Self { docker })
    }

    /// Whether the daemon answers a ping.
    pub async fn is_available(&self) -> bool {
        self.docker.ping().await.is_ok()
    }
}

fn is_not_found(err: &bollard::errors::Error) -> bool {
    matches!(
        err,
        bollard::errors::Error::DockerResponseServerError {
            status_code: 404,
            ..
        }
    )
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn create(&self, opts: CreateOpts) -> Result<String> {
        let mounts: Vec<DockerMount> = opts
            .mounts
            .iter()
            .map(|m| DockerMount {
                source: Some(m.source.clone()),
                target: Some(m.target.clone()),
                typ: Some(MountTypeEnum::BIND),
                read_only: Some(m.read_only),
                ..Default::default()
            })
            .collect();

        let host_config = HostConfig {
            nano_cpus: (opts.nano_cpus != 0).then_some(opts.nano_cpus),
            memory: (opts.memory != 0).then_some(opts.memory),
            mounts: (!mounts.is_empty()).then_some(mounts),
            ..Default::default()
        };

        let config = Config {
            image: Some(opts.image.clone()),
            cmd: (!opts.cmd.is_empty()).then(|| opts.cmd.clone()),
            env: (!opts.env.is_empty()).then(|| opts.env.clone()),
            labels: (!opts.labels.is_empty()).then(|| opts.labels.clone()),
            host_config: Some(host_config),
            ..Default::default()
        };

        let options = CreateContainerOptions {
            name: opts.name.clone(),
            ..Default::default()
        };

        let response = self
            .docker
            .create_container(Some(options), config)
            .await
            .map_err(|e| Error::Container(format!("create {:?}: {}", opts.name, e)))?;

        debug!(container = %opts.name, id = %response.id, "container created");
        Ok(response.id)
    }

    async fn start(&self, container_id: &str) -> Result<()> {
        self.docker
            .start_container(container_id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| Error::Container(format!("start {:?}: {}", container_id, e)))
    }

    async fn stop(&self, container_id: &str, timeout_secs: i64) -> Result<()> {
        self.docker
            .stop_container(container_id, Some(StopContainerOptions { t: timeout_secs }))
            .await
            .map_err(|e| Error::Container(format!("stop {:?}: {}", container_id, e)))
    }

    async fn remove(&self, container_id: &str, force: bool) -> Result<()> {
        self.docker
            .remove_container(
                container_id,
                Some(RemoveContainerOptions {
                    force,
                    ..Default::default()
                }),
            )
            .await
            .map_err(|e| Error::Container(format!("remove {:?}: {}", container_id, e)))
    }

    async fn status(&self, container_id: &str) -> Result<ContainerState> {
        let info = match self
            .docker
            .inspect_container(container_id, None::<InspectContainerOptions>)
            .await
        {
            Ok(info) => info,
            Err(e) if is_not_found(&e) => {
                return Ok(ContainerState {
                    status: ContainerStatus::NotFound,
                    exit_code: 0,
                });
            }
            Err(e) => {
                return Err(Error::Container(format!(
                    "inspect {:?}: {}",
                    container_id, e
                )));
            }
        };

        let Some(state) = info.state else {
            return Ok(ContainerState {
                status: ContainerStatus::NotFound,
                exit_code: 0,
            });
        };

        Ok(ContainerState {
            status: if state.running.unwrap_or(false) {
                ContainerStatus::Running
            } else {
                ContainerStatus::Stopped
            },
            exit_code: state.exit_code.unwrap_or(0),
        })
    }

    async fn stats(&self, container_id: &str) -> Result<ContainerStats> {
        let options = StatsOptions {
            stream: false,
            one_shot: false,
        };

        let mut stream = self.docker.stats(container_id, Some(options));
        let sample = stream
            .next()
            .await
            .ok_or_else(|| Error::Container(format!("stats {:?}: no data", container_id)))?
            .map_err(|e| Error::Container(format!("stats {:?}: {}", container_id, e)))?;

        let cpu_percent = calculate_cpu_percent(
            sample.cpu_stats.cpu_usage.total_usage,
            sample.precpu_stats.cpu_usage.total_usage,
            sample.cpu_stats.system_cpu_usage.unwrap_or(0),
            sample.precpu_stats.system_cpu_usage.unwrap_or(0),
            sample.cpu_stats.online_cpus.unwrap_or(0),
        );

        Ok(ContainerStats {
            cpu_percent,
            mem_usage: sample.memory_stats.usage.unwrap_or(0),
            mem_limit: sample.memory_stats.limit.unwrap_or(0),
        })
    }

    async fn exec(
        &self,
        container_id: &str,
        cmd: Vec<String>,
        stdin: Option<Vec<u8>>,
    ) -> Result<(Vec<u8>, i64)> {
        let exec_options = CreateExecOptions {
            cmd: Some(cmd),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            attach_stdin: Some(stdin.is_some()),
            ..Default::default()
        };

        let exec = self
            .docker
            .create_exec(container_id, exec_options)
            .await
            .map_err(|e| Error::Container(format!("exec create {:?}: {}", container_id, e)))?;

        let started = self
            .docker
            .start_exec(&exec.id, None)
            .await
            .map_err(|e| Error::Container(format!("exec start {:?}: {}", container_id, e)))?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();

        if let StartExecResults::Attached {
            mut output,
            mut input,
        } = started
        {
            // Stream stdin asynchronously and half-close the write side
            // when exhausted, so the process sees EOF.
            if let Some(bytes) = stdin {
                tokio::spawn(async move {
                    let _ = input.write_all(&bytes).await;
                    let _ = input.shutdown().await;
                });
            }

            while let Some(Ok(msg)) = output.next().await {
                match msg {
                    LogOutput::StdOut { message } => stdout.extend_from_slice(&message),
                    LogOutput::StdErr { message } => stderr.extend_from_slice(&message),
                    _ => {}
                }
            }
        }

        // Exit code comes from a post-exec inspect, not the stream itself.
        let inspect = self
            .docker
            .inspect_exec(&exec.id)
            .await
            .map_err(|e| Error::Container(format!("exec inspect {:?}: {}", container_id, e)))?;
        let exit_code = inspect.exit_code.unwrap_or(-1);

        // Output is concatenated, not interleaved: stdout first, then stderr.
        let mut combined = stdout;
        combined.extend_from_slice(&stderr);
        Ok((combined, exit_code))
    }
}

/// CPU usage percentage from two consecutive samples, Docker CLI formula:
/// `delta(container CPU) / delta(system CPU) * numCPUs * 100`. The first
/// sample of a fresh container (or a clock anomaly) produces non-positive
/// deltas; those report 0.
pub fn calculate_cpu_percent(
    cpu_total: u64,
    pre_cpu_total: u64,
    system_total: u64,
    pre_system_total: u64,
    online_cpus: u64,
) -> f64 {
    let cpu_delta = cpu_total as f64 - pre_cpu_total as f64;
    let sys_delta = system_total as f64 - pre_system_total as f64;
    if cpu_delta <= 0.0 || sys_delta <= 0.0 {
        return 0.0;
    }
    let cpus = if online_cpus == 0 { 1.0 } else { online_cpus as f64 };
    (cpu_delta / sys_delta) * cpus * 100.0
}
