//! # stage-orchestrator
//!
//! Workflow orchestration for Stagehand tasks. Ties task lifecycle
//! transitions to container operations (session launch, input delivery,
//! fork, health) and maps phase transitions onto session-registry handles.

pub mod bridge;
pub mod orchestrator;

pub use bridge::{
    PhaseSessionBridge, RegistryOpener, SessionGroup, SessionHandle, SessionRegistry,
    StartPhaseOutcome,
};
pub use orchestrator::{
    ContainerHealth, CreateProjectSpec, InputOutcome, TaskOrchestrator, TaskPatch,
};
