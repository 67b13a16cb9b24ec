//! # stage-hub
//!
//! Task and project state for Stagehand. Tasks and projects are persisted
//! as individual JSON files under the hub directory; a legacy YAML registry
//! provides a read-only alternate source of project definitions; the router
//! matches free-text input to the best project by keyword overlap.

pub mod model;
pub mod registry;
pub mod router;
pub mod store;

pub use model::{
    AgentStatus, DiffInfo, Phase, PhaseSession, Project, RouteResult, SessionStatus, Task,
    TaskStatus, VolumeSpec,
};
pub use registry::{ProjectRegistry, ProjectSource};
pub use router::route;
pub use store::{ProjectStore, TaskStore};
