//! Hub data model
//!
//! Tasks move through four workflow phases, carry a kanban-style status and
//! an orthogonal agent status, and accumulate one phase-session record per
//! phase they pass through. Projects define the workspace, routing keywords
//! and container provisioning for the tasks routed to them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stage_foundation::Error;
use std::collections::HashMap;
use std::str::FromStr;

/// Workflow phase of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Brainstorm,
    Plan,
    Execute,
    Review,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Brainstorm => "brainstorm",
            Phase::Plan => "plan",
            Phase::Execute => "execute",
            Phase::Review => "review",
        }
    }

    /// Human-readable label (for session titles)
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Brainstorm => "Brainstorm",
            Phase::Plan => "Plan",
            Phase::Execute => "Execute",
            Phase::Review => "Review",
        }
    }
}

impl Default for Phase {
    fn default() -> Self {
        Phase::Execute
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "brainstorm" => Ok(Phase::Brainstorm),
            "plan" => Ok(Phase::Plan),
            "execute" => Ok(Phase::Execute),
            "review" => Ok(Phase::Review),
            _ => Err(Error::InvalidArgument(format!("invalid phase: {:?}", s))),
        }
    }
}

/// Kanban stage of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Backlog,
    Planning,
    Running,
    Review,
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Backlog => "backlog",
            TaskStatus::Planning => "planning",
            TaskStatus::Running => "running",
            TaskStatus::Review => "review",
            TaskStatus::Done => "done",
        }
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::Backlog
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "backlog" => Ok(TaskStatus::Backlog),
            "planning" => Ok(TaskStatus::Planning),
            "running" => Ok(TaskStatus::Running),
            "review" => Ok(TaskStatus::Review),
            "done" => Ok(TaskStatus::Done),
            _ => Err(Error::InvalidArgument(format!("invalid status: {:?}", s))),
        }
    }
}

/// What the backing agent is doing right now (orthogonal to TaskStatus)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Thinking,
    Waiting,
    Running,
    Idle,
    Error,
    Complete,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Thinking => "thinking",
            AgentStatus::Waiting => "waiting",
            AgentStatus::Running => "running",
            AgentStatus::Idle => "idle",
            AgentStatus::Error => "error",
            AgentStatus::Complete => "complete",
        }
    }
}

impl Default for AgentStatus {
    fn default() -> Self {
        AgentStatus::Idle
    }
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "thinking" => Ok(AgentStatus::Thinking),
            "waiting" => Ok(AgentStatus::Waiting),
            "running" => Ok(AgentStatus::Running),
            "idle" => Ok(AgentStatus::Idle),
            "error" => Ok(AgentStatus::Error),
            "complete" => Ok(AgentStatus::Complete),
            _ => Err(Error::InvalidArgument(format!(
                "invalid agent status: {:?}",
                s
            ))),
        }
    }
}

/// Lifecycle of one phase-session record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Complete,
}

/// Record of one phase's execution window on a task.
///
/// Created when a phase starts, closed (with a summary) when the task
/// transitions to the next phase. Never deleted independently of its task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseSession {
    /// `<taskID>-<phase>`
    pub id: String,
    pub phase: Phase,
    pub status: SessionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Handle id in the external session registry
    pub session_handle_id: String,
}

/// Working-tree diff counters reported by the agent
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiffInfo {
    pub files: u32,
    pub add: u32,
    pub del: u32,
}

/// A unit of orchestrated work moving through phases, backed at times by a
/// live tmux session inside a project container.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Monotonic `t-NNN` identifier, assigned on first save, never reused
    #[serde(default)]
    pub id: String,
    pub project: String,
    pub description: String,
    #[serde(default)]
    pub phase: Phase,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub agent_status: AgentStatus,
    /// Name of the backing tmux session, when one has been launched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tmux_session: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skills: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mcps: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<DiffInfo>,
    /// Resolved container name, if the task runs in one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
    /// Pending clarification the agent is waiting on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ask_question: Option<String>,
    /// Append-only audit trail of phase sessions; at most one active
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sessions: Vec<PhaseSession>,
    /// Fork lineage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_task_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Create an unsaved task at the initial state (backlog / idle).
    pub fn new(project: impl Into<String>, description: impl Into<String>, phase: Phase) -> Self {
        Self {
            project: project.into(),
            description: description.into(),
            phase,
            status: TaskStatus::Backlog,
            agent_status: AgentStatus::Idle,
            ..Default::default()
        }
    }

    /// Returns the currently active phase-session, if any.
    pub fn active_session(&self) -> Option<&PhaseSession> {
        self.sessions
            .iter()
            .find(|s| s.status == SessionStatus::Active)
    }
}

/// Bind-mount triple for container provisioning
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSpec {
    pub host: String,
    pub container: String,
    #[serde(default)]
    pub read_only: bool,
}

/// A named workspace with routing keywords and container configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// Primary key; doubles as the filename stem
    pub name: String,
    #[serde(default)]
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    /// Name of the provisioned container, when one exists
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
    // legacy projects.yaml files use the snake_case key
    #[serde(default, alias = "default_mcps", skip_serializing_if = "Vec::is_empty")]
    pub default_mcps: Vec<String>,
    // Container provisioning
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// CPU limit in cores (e.g. 2.0)
    #[serde(default, skip_serializing_if = "is_zero_f64")]
    pub cpu_limit: f64,
    /// Memory limit in bytes
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub memory_limit: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<VolumeSpec>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,
    /// Live container state; computed per request, never persisted
    #[serde(skip)]
    pub container_status: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

fn is_zero_f64(v: &f64) -> bool {
    *v == 0.0
}

fn is_zero_i64(v: &i64) -> bool {
    *v == 0
}

/// Keyword-match routing result. Ephemeral, computed per call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteResult {
    pub project: String,
    /// matched keywords / total keywords for the winning project
    pub confidence: f64,
    pub matched_keywords: Vec<String>,
}
