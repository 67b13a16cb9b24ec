//! End-to-end workflow test over real file stores
//!
//! `cargo test -p stage-orchestrator --test workflow_test`

use parking_lot::Mutex;
use stage_foundation::Result;
use stage_hub::model::{AgentStatus, Phase, SessionStatus, TaskStatus};
use stage_hub::store::{ProjectStore, TaskStore};
use stage_hub::{route, Project};
use stage_orchestrator::{
    CreateProjectSpec, InputOutcome, PhaseSessionBridge, RegistryOpener, SessionGroup,
    SessionHandle, SessionRegistry, TaskOrchestrator,
};
use stage_workspace::Executor;
use std::sync::Arc;
use tempfile::TempDir;

struct FakeExecutor {
    healthy: bool,
    log_tail: String,
    commands: Mutex<Vec<Vec<String>>>,
}

#[async_trait::async_trait]
impl Executor for FakeExecutor {
    async fn is_healthy(&self, _container: &str) -> bool {
        self.healthy
    }

    async fn exec(&self, _container: &str, cmd: Vec<String>) -> Result<String> {
        let is_tail = cmd.first().map(String::as_str) == Some("tail");
        self.commands.lock().push(cmd);
        Ok(if is_tail {
            self.log_tail.clone()
        } else {
            String::new()
        })
    }
}

struct FakeRegistry {
    handles: Arc<Mutex<Vec<SessionHandle>>>,
}

impl SessionRegistry for FakeRegistry {
    fn load_with_groups(&mut self) -> Result<(Vec<SessionHandle>, Vec<SessionGroup>)> {
        Ok((self.handles.lock().clone(), Vec::new()))
    }

    fn save(&mut self, handles: &[SessionHandle]) -> Result<()> {
        *self.handles.lock() = handles.to_vec();
        Ok(())
    }
}

fn opener(handles: Arc<Mutex<Vec<SessionHandle>>>) -> RegistryOpener {
    Box::new(move |_profile| {
        Ok(Box::new(FakeRegistry {
            handles: handles.clone(),
        }) as Box<dyn SessionRegistry>)
    })
}

#[tokio::test]
async fn test_full_task_lifecycle() {
    let dir = TempDir::new().unwrap();
    let tasks = Arc::new(TaskStore::new(dir.path()).unwrap());
    let projects = Arc::new(ProjectStore::new(dir.path()).unwrap());

    let executor = Arc::new(FakeExecutor {
        healthy: true,
        log_tail: "$ claude\nthinking...\n".to_string(),
        commands: Mutex::new(Vec::new()),
    });
    let orch = TaskOrchestrator::new(tasks.clone(), projects.clone())
        .with_executor(executor.clone());

    // project with a pre-provisioned container
    let project = orch
        .create_project(CreateProjectSpec {
            name: "api-service".to_string(),
            path: "/home/user/code/api".to_string(),
            keywords: vec!["api".to_string(), "auth".to_string()],
            container: Some("sandbox-api".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(project.name, "api-service");

    // free text routes to it
    let all = projects.list().unwrap();
    let routed = route("fix the api auth flow", &all).unwrap();
    assert_eq!(routed.project, "api-service");
    assert_eq!(routed.confidence, 1.0);

    // creating a task launches the agent session
    let task = orch
        .create_task(&routed.project, "Fix the auth flow", None)
        .await
        .unwrap();
    assert_eq!(task.id, "t-001");
    assert_eq!(task.status, TaskStatus::Running);
    assert_eq!(task.agent_status, AgentStatus::Thinking);
    assert_eq!(task.tmux_session.as_deref(), Some("agent-t-001"));

    // a live preview comes from the session log
    let preview = orch.preview(&task.id).await.unwrap();
    assert!(preview.contains("thinking"));

    // input reaches the session
    let outcome = orch.deliver_input(&task.id, "Use JWT tokens").await.unwrap();
    assert_eq!(outcome, InputOutcome::Delivered);

    // health reflects the running container
    let health = orch.health_check(&task.id).await.unwrap();
    assert!(health.healthy);
    assert_eq!(health.container.as_deref(), Some("sandbox-api"));

    // forking spawns a fresh child at the initial state
    let child = orch.fork_task(&task.id, Some("Try refresh tokens")).unwrap();
    assert_eq!(child.id, "t-002");
    assert_eq!(child.parent_task_id.as_deref(), Some("t-001"));
    assert_eq!(child.status, TaskStatus::Backlog);
}

#[tokio::test]
async fn test_phase_transitions_with_bridge() {
    let dir = TempDir::new().unwrap();
    let tasks = Arc::new(TaskStore::new(dir.path()).unwrap());
    let projects = Arc::new(ProjectStore::new(dir.path()).unwrap());

    let mut project = Project {
        name: "api-service".to_string(),
        path: "/home/user/code/api".to_string(),
        ..Default::default()
    };
    projects.save(&mut project).unwrap();

    let orch = TaskOrchestrator::new(tasks.clone(), projects.clone());
    let task = orch
        .create_task("api-service", "Fix the auth flow", Some(Phase::Brainstorm))
        .await
        .unwrap();

    let handles: Arc<Mutex<Vec<SessionHandle>>> = Arc::new(Mutex::new(Vec::new()));
    let bridge = PhaseSessionBridge::new("default", tasks.clone(), projects, opener(handles.clone()));

    let started = bridge.start_phase(&task.id, Phase::Brainstorm).unwrap();
    assert_eq!(bridge.get_active_session_id(&task.id).unwrap(), started.session_id);

    bridge
        .transition_phase(&task.id, Phase::Plan, "settled on JWT")
        .unwrap();
    bridge
        .transition_phase(&task.id, Phase::Execute, "plan approved")
        .unwrap();

    // one handle per phase in the registry
    assert_eq!(handles.lock().len(), 3);

    // the task's audit trail keeps every phase, exactly one active
    let stored = tasks.get(&task.id).unwrap();
    assert_eq!(stored.sessions.len(), 3);
    let phases: Vec<Phase> = stored.sessions.iter().map(|s| s.phase).collect();
    assert_eq!(phases, vec![Phase::Brainstorm, Phase::Plan, Phase::Execute]);
    let active: Vec<_> = stored
        .sessions
        .iter()
        .filter(|s| s.status == SessionStatus::Active)
        .collect();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].phase, Phase::Execute);
    assert_eq!(stored.sessions[0].summary.as_deref(), Some("settled on JWT"));
    assert_eq!(stored.phase, Phase::Execute);
}

#[tokio::test]
async fn test_unhealthy_container_keeps_task_in_backlog() {
    let dir = TempDir::new().unwrap();
    let tasks = Arc::new(TaskStore::new(dir.path()).unwrap());
    let projects = Arc::new(ProjectStore::new(dir.path()).unwrap());

    let mut project = Project {
        name: "api-service".to_string(),
        container: Some("sandbox-api".to_string()),
        ..Default::default()
    };
    projects.save(&mut project).unwrap();

    let executor = Arc::new(FakeExecutor {
        healthy: false,
        log_tail: String::new(),
        commands: Mutex::new(Vec::new()),
    });
    let orch = TaskOrchestrator::new(tasks, projects).with_executor(executor.clone());

    let task = orch
        .create_task("api-service", "Fix the auth flow", None)
        .await
        .unwrap();
    assert_eq!(task.status, TaskStatus::Backlog);
    assert!(task.tmux_session.is_none());
    assert!(executor.commands.lock().is_empty());

    // input is queued, not delivered
    let outcome = orch.deliver_input(&task.id, "hello").await.unwrap();
    assert_eq!(outcome, InputOutcome::Queued);
}
