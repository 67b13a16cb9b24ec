//! # stage-workspace
//!
//! Abstraction over the ephemeral compute backing tasks: a container
//! runtime trait with a Docker (bollard) adapter, an executor capability
//! for health checks and in-container command execution, and the tmux
//! session launcher used to talk to the agent.

pub mod docker;
pub mod executor;
pub mod runtime;

pub use docker::DockerRuntime;
pub use executor::{Executor, RuntimeExecutor, SessionLauncher};
pub use runtime::{
    container_name_for_project, ContainerRuntime, ContainerState, ContainerStats, ContainerStatus,
    CreateOpts, Mount,
};
