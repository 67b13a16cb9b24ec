//! Task Orchestrator - drives the task state machine
//!
//! Creation, partial updates, forking, input delivery, health probing and
//! live previews. Container side effects (session launch, auto-provision)
//! are best-effort: a failure is logged and the task stays in its current
//! state rather than failing the whole request.

use stage_foundation::{Error, Result};
use stage_hub::model::{AgentStatus, Phase, Project, Task, TaskStatus, VolumeSpec};
use stage_hub::store::{ProjectStore, TaskStore};
use stage_workspace::{
    container_name_for_project, ContainerRuntime, CreateOpts, Executor, Mount, SessionLauncher,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

/// Partial update to a task. Enum-valued fields arrive as raw strings and
/// are all validated before any field is applied.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub description: Option<String>,
    pub phase: Option<String>,
    pub status: Option<String>,
    pub agent_status: Option<String>,
    pub branch: Option<String>,
    pub ask_question: Option<String>,
}

/// What happened to a piece of delivered input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputOutcome {
    /// Sent into the task's live session.
    Delivered,
    /// Accepted but no session was connected to receive it.
    Queued,
}

impl InputOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputOutcome::Delivered => "delivered",
            InputOutcome::Queued => "queued",
        }
    }
}

/// Result of a task health probe.
#[derive(Debug, Clone)]
pub struct ContainerHealth {
    pub healthy: bool,
    pub container: Option<String>,
    pub message: Option<String>,
}

/// Input to project creation. Only `name` or `repo` is required.
#[derive(Debug, Clone, Default)]
pub struct CreateProjectSpec {
    pub name: String,
    pub repo: Option<String>,
    pub path: String,
    pub keywords: Vec<String>,
    pub container: Option<String>,
    pub default_mcps: Vec<String>,
    pub image: Option<String>,
    pub cpu_limit: f64,
    pub memory_limit: i64,
    pub volumes: Vec<VolumeSpec>,
    pub env: HashMap<String, String>,
}

/// Orchestrates task lifecycle against the stores and the container layer.
///
/// The executor and runtime are optional: without them the orchestrator
/// still manages tasks and projects, it just never launches sessions or
/// provisions containers.
pub struct TaskOrchestrator {
    tasks: Arc<TaskStore>,
    projects: Arc<ProjectStore>,
    executor: Option<Arc<dyn Executor>>,
    launcher: Option<SessionLauncher>,
    runtime: Option<Arc<dyn ContainerRuntime>>,
}

impl TaskOrchestrator {
    pub fn new(tasks: Arc<TaskStore>, projects: Arc<ProjectStore>) -> Self {
        Self {
            tasks,
            projects,
            executor: None,
            launcher: None,
            runtime: None,
        }
    }

    /// Enables session launch, input delivery and previews.
    pub fn with_executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.launcher = Some(SessionLauncher::new(executor.clone()));
        self.executor = Some(executor);
        self
    }

    /// Enables container auto-provisioning on project creation.
    pub fn with_runtime(mut self, runtime: Arc<dyn ContainerRuntime>) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn tasks(&self) -> &Arc<TaskStore> {
        &self.tasks
    }

    pub fn projects(&self) -> &Arc<ProjectStore> {
        &self.projects
    }

    /// Creates a task and, when its project has a running container,
    /// launches the backing session and delivers the phase prompt.
    /// Launch failure leaves the task at backlog/idle.
    pub async fn create_task(
        &self,
        project: &str,
        description: &str,
        phase: Option<Phase>,
    ) -> Result<Task> {
        if project.is_empty() {
            return Err(Error::InvalidArgument("project is required".to_string()));
        }
        if description.is_empty() {
            return Err(Error::InvalidArgument("description is required".to_string()));
        }

        let mut task = Task::new(project, description, phase.unwrap_or_default());
        self.tasks.save(&mut task)?;

        if let (Some(executor), Some(launcher)) = (&self.executor, &self.launcher) {
            if let Some(container) = self.container_for_project(&task.project) {
                if executor.is_healthy(&container).await {
                    match launcher.launch(&container, &task.id).await {
                        Ok(session) => {
                            let prompt = phase_prompt(task.phase, &task.description);
                            if let Err(e) =
                                launcher.send_input(&container, &session, &prompt).await
                            {
                                warn!(task = %task.id, error = %e, "initial prompt not delivered");
                            }
                            task.tmux_session = Some(session);
                            task.status = TaskStatus::Running;
                            task.agent_status = AgentStatus::Thinking;
                            self.tasks.save(&mut task)?;
                        }
                        Err(e) => {
                            warn!(task = %task.id, container = %container, error = %e,
                                "session launch failed");
                        }
                    }
                } else {
                    debug!(task = %task.id, container = %container, "container not healthy, task stays in backlog");
                }
            }
        }

        Ok(task)
    }

    /// Applies a partial update. Every provided enum value is validated
    /// before any field is written, so a bad value never partially applies.
    pub fn update_task(&self, id: &str, patch: TaskPatch) -> Result<Task> {
        let mut task = self.tasks.get(id)?;

        let phase = patch.phase.as_deref().map(str::parse::<Phase>).transpose()?;
        let status = patch
            .status
            .as_deref()
            .map(str::parse::<TaskStatus>)
            .transpose()?;
        let agent_status = patch
            .agent_status
            .as_deref()
            .map(str::parse::<AgentStatus>)
            .transpose()?;

        if let Some(description) = patch.description {
            task.description = description;
        }
        if let Some(phase) = phase {
            task.phase = phase;
        }
        if let Some(status) = status {
            task.status = status;
        }
        if let Some(agent_status) = agent_status {
            task.agent_status = agent_status;
        }
        if let Some(branch) = patch.branch {
            task.branch = Some(branch);
        }
        if let Some(ask_question) = patch.ask_question {
            task.ask_question = (!ask_question.is_empty()).then_some(ask_question);
        }

        self.tasks.save(&mut task)?;
        Ok(task)
    }

    /// Sends text into the task's live session if one is connected;
    /// otherwise the input is accepted as queued.
    pub async fn deliver_input(&self, id: &str, text: &str) -> Result<InputOutcome> {
        if text.is_empty() {
            return Err(Error::InvalidArgument("input is required".to_string()));
        }

        let task = self.tasks.get(id)?;

        if let (Some(launcher), Some(session)) = (&self.launcher, task.tmux_session.as_deref()) {
            if !session.is_empty() {
                if let Some(container) = self.container_for_project(&task.project) {
                    match launcher.send_input(&container, session, text).await {
                        Ok(()) => return Ok(InputOutcome::Delivered),
                        Err(e) => {
                            warn!(task = %id, session, error = %e, "input delivery failed");
                        }
                    }
                }
            }
        }

        Ok(InputOutcome::Queued)
    }

    /// Creates a child task inheriting project, branch and phase from the
    /// parent. The child starts fresh: no sessions, backlog/idle.
    pub fn fork_task(&self, parent_id: &str, description: Option<&str>) -> Result<Task> {
        let parent = self.tasks.get(parent_id)?;

        let description = match description {
            Some(d) if !d.is_empty() => d.to_string(),
            _ => format!("{} (fork)", parent.description),
        };

        let mut child = Task::new(&parent.project, description, parent.phase);
        child.branch = parent.branch.clone();
        child.parent_task_id = Some(parent.id.clone());
        self.tasks.save(&mut child)?;
        Ok(child)
    }

    /// Probes the task's project container. A project without a configured
    /// container is unhealthy without ever touching the executor.
    pub async fn health_check(&self, id: &str) -> Result<ContainerHealth> {
        let task = self.tasks.get(id)?;

        let Some(container) = self.container_for_project(&task.project) else {
            return Ok(ContainerHealth {
                healthy: false,
                container: None,
                message: Some("no container configured for project".to_string()),
            });
        };

        let Some(executor) = &self.executor else {
            return Ok(ContainerHealth {
                healthy: false,
                container: Some(container),
                message: Some("container executor not configured".to_string()),
            });
        };

        let healthy = executor.is_healthy(&container).await;
        Ok(ContainerHealth {
            healthy,
            container: Some(container),
            message: (!healthy).then(|| "container not running".to_string()),
        })
    }

    /// One snapshot of the task's session log. Requires both a recorded
    /// session and a resolvable container; missing either is Unavailable,
    /// not NotFound, since the task itself exists.
    pub async fn preview(&self, id: &str) -> Result<String> {
        let task = self.tasks.get(id)?;

        let session = match task.tmux_session.as_deref() {
            Some(s) if !s.is_empty() => s,
            _ => return Err(Error::Unavailable("no active session".to_string())),
        };
        let Some(launcher) = &self.launcher else {
            return Err(Error::Unavailable("no active session".to_string()));
        };
        let Some(container) = self.container_for_project(&task.project) else {
            return Err(Error::Unavailable("no container configured".to_string()));
        };

        launcher.preview(&container, session).await
    }

    /// Creates a project, deriving name and path when omitted, and
    /// auto-provisions its container when an image is given and a runtime
    /// is attached. Provisioning failure is logged, never fatal.
    pub async fn create_project(&self, spec: CreateProjectSpec) -> Result<Project> {
        let name = if !spec.name.is_empty() {
            spec.name.clone()
        } else {
            spec.repo
                .as_deref()
                .and_then(|r| r.rsplit('/').next())
                .unwrap_or_default()
                .to_string()
        };
        if name.is_empty() {
            return Err(Error::InvalidArgument("repo or name is required".to_string()));
        }

        if self.projects.exists(&name) {
            return Err(Error::Conflict(format!("project already exists: {}", name)));
        }

        let path = if !spec.path.is_empty() {
            spec.path.clone()
        } else {
            let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("/tmp"));
            home.join("projects").join(&name).to_string_lossy().into_owned()
        };

        let mut project = Project {
            name,
            path,
            repo: spec.repo,
            keywords: spec.keywords,
            container: spec.container,
            default_mcps: spec.default_mcps,
            image: spec.image,
            cpu_limit: spec.cpu_limit,
            memory_limit: spec.memory_limit,
            volumes: spec.volumes,
            env: spec.env,
            ..Default::default()
        };
        self.projects.save(&mut project)?;

        if let (Some(image), Some(runtime)) = (project.image.clone(), &self.runtime) {
            if !image.is_empty() {
                let container_name = container_name_for_project(&project.name);
                let opts = CreateOpts {
                    name: container_name.clone(),
                    image,
                    cmd: Vec::new(),
                    env: project
                        .env
                        .iter()
                        .map(|(k, v)| format!("{}={}", k, v))
                        .collect(),
                    labels: HashMap::from([(
                        "stagehand.project".to_string(),
                        project.name.clone(),
                    )]),
                    nano_cpus: (project.cpu_limit * 1e9) as i64,
                    memory: project.memory_limit,
                    mounts: project
                        .volumes
                        .iter()
                        .map(|v| Mount {
                            source: v.host.clone(),
                            target: v.container.clone(),
                            read_only: v.read_only,
                        })
                        .collect(),
                };

                match runtime.create(opts).await {
                    Ok(_) => {
                        if let Err(e) = runtime.start(&container_name).await {
                            warn!(project = %project.name, container = %container_name,
                                error = %e, "provisioned container failed to start");
                        }
                        project.container = Some(container_name);
                        self.projects.save(&mut project)?;
                    }
                    Err(e) => {
                        warn!(project = %project.name, error = %e,
                            "container auto-provision failed");
                    }
                }
            }
        }

        Ok(project)
    }

    fn container_for_project(&self, project: &str) -> Option<String> {
        self.projects
            .get(project)
            .ok()
            .and_then(|p| p.container)
            .filter(|c| !c.is_empty())
    }
}

/// The initial prompt typed into a fresh session for a phase.
fn phase_prompt(phase: Phase, description: &str) -> String {
    match phase {
        Phase::Brainstorm => format!("/brainstorm {}", description),
        Phase::Plan => format!("Create an implementation plan for: {}", description),
        Phase::Execute => description.to_string(),
        Phase::Review => format!("Review the implementation of: {}", description),
    }
}
