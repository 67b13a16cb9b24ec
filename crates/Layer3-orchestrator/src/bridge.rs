//! Phase Session Bridge - links task phases to session-registry handles
//!
//! Each phase a task enters gets one session handle in the external
//! registry and one matching entry in the task's `sessions` audit trail.
//! The registry is load-append-save, so writes are serialized behind a
//! bridge-wide lock.

use parking_lot::Mutex;
use stage_foundation::{Error, Result};
use stage_hub::model::{AgentStatus, Phase, PhaseSession, SessionStatus, TaskStatus};
use stage_hub::store::{ProjectStore, TaskStore};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// A record in the external session registry.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionHandle {
    pub id: String,
    pub title: String,
    pub path: String,
    pub group: String,
    pub tool: String,
}

impl SessionHandle {
    pub fn new(
        title: impl Into<String>,
        path: impl Into<String>,
        group: impl Into<String>,
        tool: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            path: path.into(),
            group: group.into(),
            tool: tool.into(),
        }
    }
}

/// A session group as the registry reports it.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionGroup {
    pub id: String,
    pub name: String,
}

/// External storage of session handles. One registry per profile.
pub trait SessionRegistry: Send {
    fn load_with_groups(&mut self) -> Result<(Vec<SessionHandle>, Vec<SessionGroup>)>;
    fn save(&mut self, handles: &[SessionHandle]) -> Result<()>;
}

/// Opens a registry for a profile name. Injected so tests and alternate
/// backends can substitute their own storage.
pub type RegistryOpener = Box<dyn Fn(&str) -> Result<Box<dyn SessionRegistry>> + Send + Sync>;

/// Result of starting a phase.
#[derive(Debug, Clone)]
pub struct StartPhaseOutcome {
    pub session_id: String,
    pub phase: Phase,
}

const GROUP: &str = "hub";
const TOOL: &str = "claude";

/// Maps task phase transitions onto session handles.
pub struct PhaseSessionBridge {
    tasks: Arc<TaskStore>,
    projects: Arc<ProjectStore>,
    opener: RegistryOpener,
    profile: String,
    // serializes load-append-save against the registry
    registry_lock: Mutex<()>,
}

impl PhaseSessionBridge {
    pub fn new(
        profile: impl Into<String>,
        tasks: Arc<TaskStore>,
        projects: Arc<ProjectStore>,
        opener: RegistryOpener,
    ) -> Self {
        let profile = profile.into();
        Self {
            tasks,
            projects,
            opener,
            profile: if profile.is_empty() {
                "default".to_string()
            } else {
                profile
            },
            registry_lock: Mutex::new(()),
        }
    }

    /// Opens a phase for the task: appends an active session entry, moves
    /// the task to running/thinking, and persists a handle to the registry.
    pub fn start_phase(&self, task_id: &str, phase: Phase) -> Result<StartPhaseOutcome> {
        let mut task = self.tasks.get(task_id)?;

        let mut path = self
            .projects
            .get(&task.project)
            .map(|p| p.path)
            .unwrap_or_default();
        if path.is_empty() {
            warn!(task = %task.id, project = %task.project,
                "project path unresolvable, session falls back to /tmp");
            path = "/tmp".to_string();
        }

        let title = format!(
            "[{}] {}: {}",
            task.id,
            phase.label(),
            truncate(&task.description, 40)
        );
        let handle = SessionHandle::new(title, path, GROUP, TOOL);

        task.sessions.push(PhaseSession {
            id: format!("{}-{}", task.id, phase.as_str()),
            phase,
            status: SessionStatus::Active,
            duration: None,
            artifact: None,
            summary: None,
            session_handle_id: handle.id.clone(),
        });
        task.phase = phase;
        task.status = TaskStatus::Running;
        task.agent_status = AgentStatus::Thinking;
        self.tasks.save(&mut task)?;

        self.persist_handle(handle.clone())?;

        Ok(StartPhaseOutcome {
            session_id: handle.id,
            phase,
        })
    }

    /// The registry handle id behind the task's active phase session.
    pub fn get_active_session_id(&self, task_id: &str) -> Result<String> {
        let task = self.tasks.get(task_id)?;
        task.active_session()
            .map(|s| s.session_handle_id.clone())
            .ok_or_else(|| Error::NotFound(format!("no active session for task {}", task_id)))
    }

    /// Closes the active phase with a summary, then opens the next one.
    /// The task's sessions list grows append-only, one entry per phase.
    pub fn transition_phase(
        &self,
        task_id: &str,
        next_phase: Phase,
        summary: &str,
    ) -> Result<StartPhaseOutcome> {
        let mut task = self.tasks.get(task_id)?;

        for session in &mut task.sessions {
            if session.status == SessionStatus::Active {
                session.status = SessionStatus::Complete;
                session.summary = (!summary.is_empty()).then(|| summary.to_string());
            }
        }
        self.tasks.save(&mut task)?;

        self.start_phase(task_id, next_phase)
    }

    fn persist_handle(&self, handle: SessionHandle) -> Result<()> {
        let _guard = self.registry_lock.lock();

        let mut registry = (self.opener)(&self.profile)?;
        let (mut handles, _groups) = registry.load_with_groups()?;
        handles.push(handle);
        registry.save(&handles)
    }
}

fn truncate(s: &str, max: usize) -> String {
    let count = s.chars().count();
    if count <= max {
        return s.to_string();
    }
    let cut: String = s.chars().take(max - 3).collect();
    format!("{}...", cut)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stage_hub::model::{Project, Task};
    use tempfile::TempDir;

    struct MemoryRegistry {
        handles: Arc<Mutex<Vec<SessionHandle>>>,
    }

    impl SessionRegistry for MemoryRegistry {
        fn load_with_groups(&mut self) -> Result<(Vec<SessionHandle>, Vec<SessionGroup>)> {
            Ok((self.handles.lock().clone(), Vec::new()))
        }

        fn save(&mut self, handles: &[SessionHandle]) -> Result<()> {
            *self.handles.lock() = handles.to_vec();
            Ok(())
        }
    }

    fn bridge_with_task(
        dir: &TempDir,
        description: &str,
    ) -> (PhaseSessionBridge, Arc<TaskStore>, Arc<Mutex<Vec<SessionHandle>>>, String) {
        let tasks = Arc::new(TaskStore::new(dir.path()).unwrap());
        let projects = Arc::new(ProjectStore::new(dir.path()).unwrap());

        let mut project = Project {
            name: "api-service".to_string(),
            path: "/home/user/code/api".to_string(),
            ..Default::default()
        };
        projects.save(&mut project).unwrap();

        let mut task = Task::new("api-service", description, Phase::Brainstorm);
        tasks.save(&mut task).unwrap();
        let task_id = task.id.clone();

        let handles: Arc<Mutex<Vec<SessionHandle>>> = Arc::new(Mutex::new(Vec::new()));
        let shared = handles.clone();
        let opener: RegistryOpener = Box::new(move |_profile| {
            Ok(Box::new(MemoryRegistry {
                handles: shared.clone(),
            }) as Box<dyn SessionRegistry>)
        });

        let bridge = PhaseSessionBridge::new("default", tasks.clone(), projects, opener);
        (bridge, tasks, handles, task_id)
    }

    #[test]
    fn test_start_phase_creates_active_session_and_handle() {
        let dir = TempDir::new().unwrap();
        let (bridge, tasks, handles, task_id) = bridge_with_task(&dir, "Fix auth bug");

        let outcome = bridge.start_phase(&task_id, Phase::Brainstorm).unwrap();
        assert_eq!(outcome.phase, Phase::Brainstorm);

        let task = tasks.get(&task_id).unwrap();
        assert_eq!(task.sessions.len(), 1);
        assert_eq!(task.sessions[0].id, format!("{}-brainstorm", task_id));
        assert_eq!(task.sessions[0].status, SessionStatus::Active);
        assert_eq!(task.sessions[0].session_handle_id, outcome.session_id);
        assert_eq!(task.status, TaskStatus::Running);
        assert_eq!(task.agent_status, AgentStatus::Thinking);

        let stored = handles.lock();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, outcome.session_id);
        assert_eq!(
            stored[0].title,
            format!("[{}] Brainstorm: Fix auth bug", task_id)
        );
        assert_eq!(stored[0].path, "/home/user/code/api");
    }

    #[test]
    fn test_start_phase_truncates_long_description() {
        let dir = TempDir::new().unwrap();
        let long = "a".repeat(60);
        let (bridge, _tasks, handles, task_id) = bridge_with_task(&dir, &long);

        bridge.start_phase(&task_id, Phase::Plan).unwrap();

        let stored = handles.lock();
        let expected = format!("[{}] Plan: {}...", task_id, "a".repeat(37));
        assert_eq!(stored[0].title, expected);
    }

    #[test]
    fn test_start_phase_falls_back_to_tmp_path() {
        let dir = TempDir::new().unwrap();
        let tasks = Arc::new(TaskStore::new(dir.path()).unwrap());
        let projects = Arc::new(ProjectStore::new(dir.path()).unwrap());

        // task references a project that was never saved
        let mut task = Task::new("ghost", "Fix auth bug", Phase::Execute);
        tasks.save(&mut task).unwrap();

        let handles: Arc<Mutex<Vec<SessionHandle>>> = Arc::new(Mutex::new(Vec::new()));
        let shared = handles.clone();
        let opener: RegistryOpener = Box::new(move |_| {
            Ok(Box::new(MemoryRegistry {
                handles: shared.clone(),
            }) as Box<dyn SessionRegistry>)
        });
        let bridge = PhaseSessionBridge::new("default", tasks, projects, opener);

        bridge.start_phase(&task.id, Phase::Execute).unwrap();
        assert_eq!(handles.lock()[0].path, "/tmp");
    }

    #[test]
    fn test_get_active_session_id() {
        let dir = TempDir::new().unwrap();
        let (bridge, _tasks, _handles, task_id) = bridge_with_task(&dir, "Fix auth bug");

        let err = bridge.get_active_session_id(&task_id).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        let outcome = bridge.start_phase(&task_id, Phase::Brainstorm).unwrap();
        let active = bridge.get_active_session_id(&task_id).unwrap();
        assert_eq!(active, outcome.session_id);
    }

    #[test]
    fn test_transition_phase_appends_audit_trail() {
        let dir = TempDir::new().unwrap();
        let (bridge, tasks, handles, task_id) = bridge_with_task(&dir, "Fix auth bug");

        bridge.start_phase(&task_id, Phase::Brainstorm).unwrap();
        bridge
            .transition_phase(&task_id, Phase::Plan, "decided on JWT")
            .unwrap();

        let task = tasks.get(&task_id).unwrap();
        assert_eq!(task.sessions.len(), 2);
        assert_eq!(task.sessions[0].status, SessionStatus::Complete);
        assert_eq!(task.sessions[0].summary.as_deref(), Some("decided on JWT"));
        assert_eq!(task.sessions[1].status, SessionStatus::Active);
        assert_eq!(task.sessions[1].phase, Phase::Plan);
        assert_eq!(task.phase, Phase::Plan);

        // both handles survive in the registry
        assert_eq!(handles.lock().len(), 2);
    }

    #[test]
    fn test_truncate_boundaries() {
        assert_eq!(truncate("short", 40), "short");
        assert_eq!(truncate(&"x".repeat(40), 40), "x".repeat(40));
        assert_eq!(truncate(&"x".repeat(41), 40), format!("{}...", "x".repeat(37)));
    }
}
