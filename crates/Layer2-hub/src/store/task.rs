//! Task store
//!
//! Each task lives in `<base>/tasks/<id>.json`. IDs are sequential
//! `t-NNN` values allocated by scanning the directory for the highest
//! existing suffix, so an ID is never reused even after deletion.

use crate::model::Task;
use crate::store::valid_file_stem;
use chrono::Utc;
use parking_lot::RwLock;
use serde_json::Value;
use stage_foundation::{Error, JsonDir, Result};
use std::path::Path;

/// Legacy single-status values and the (status, agentStatus) pair each one
/// migrates to. Old task files carried only an agent-level status; the
/// split model stores the kanban stage and agent activity separately.
const LEGACY_STATUS_MIGRATION: [(&str, &str, &str); 6] = [
    ("thinking", "running", "thinking"),
    ("waiting", "planning", "waiting"),
    ("running", "running", "running"),
    ("idle", "backlog", "idle"),
    ("error", "running", "error"),
    ("complete", "done", "complete"),
];

/// Filesystem JSON-based CRUD for [`Task`] records.
pub struct TaskStore {
    lock: RwLock<()>,
    files: JsonDir,
}

impl TaskStore {
    /// Creates a TaskStore backed by `<base>/tasks/`, creating the
    /// directory if needed.
    pub fn new(base: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            lock: RwLock::new(()),
            files: JsonDir::new(base.as_ref().join("tasks"))?,
        })
    }

    /// Returns all tasks sorted by creation time (oldest first), skipping
    /// any file that fails to parse. A single corrupt record must not
    /// block listing.
    pub fn list(&self) -> Result<Vec<Task>> {
        let _guard = self.lock.read();

        let mut tasks = Vec::new();
        for stem in self.files.json_stems()? {
            match self.read_task(&stem) {
                Ok(task) => tasks.push(task),
                Err(_) => continue, // skip corrupt files
            }
        }

        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(tasks)
    }

    /// Retrieves a single task by ID. A structurally invalid ID reads as
    /// NotFound: no file could ever exist under it.
    pub fn get(&self, id: &str) -> Result<Task> {
        if !valid_file_stem(id) {
            return Err(Error::not_found("task", id));
        }
        let _guard = self.lock.read();
        self.read_task(id)
    }

    /// Persists a task. Assigns an ID when absent; sets `created_at` on
    /// first save and always refreshes `updated_at`.
    pub fn save(&self, task: &mut Task) -> Result<()> {
        let _guard = self.lock.write();

        if task.id.is_empty() {
            task.id = self.next_id()?;
        } else if !valid_file_stem(&task.id) {
            return Err(Error::InvalidArgument(format!(
                "invalid task ID: {:?}",
                task.id
            )));
        }
        if task.created_at.is_none() {
            task.created_at = Some(Utc::now());
        }
        task.updated_at = Some(Utc::now());

        self.files.save(&task.id, task)
    }

    /// Removes a task by ID.
    pub fn delete(&self, id: &str) -> Result<()> {
        if !valid_file_stem(id) {
            return Err(Error::not_found("task", id));
        }
        let _guard = self.lock.write();
        self.files
            .remove(id)
            .map_err(|e| match e {
                Error::NotFound(_) => Error::not_found("task", id),
                other => other,
            })
    }

    fn read_task(&self, id: &str) -> Result<Task> {
        let mut value: Value = self.files.load(id).map_err(|e| match e {
            Error::NotFound(_) => Error::not_found("task", id),
            other => other,
        })?;
        migrate_legacy_status(&mut value);
        serde_json::from_value(value)
            .map_err(|e| Error::Storage(format!("parse task {}: {}", id, e)))
    }

    /// Scans existing task files and returns the next sequential ID.
    /// Must be called with the write lock held.
    fn next_id(&self) -> Result<String> {
        let mut max = 0u32;
        for stem in self.files.json_stems()? {
            if let Some(num) = stem.strip_prefix("t-").and_then(|n| n.parse::<u32>().ok()) {
                max = max.max(num);
            }
        }
        Ok(format!("t-{:03}", max + 1))
    }
}

/// Rewrites a legacy single-status record into the split
/// (status, agentStatus) pair. Fires only when `agentStatus` is absent,
/// which makes it idempotent. Returns true if a rewrite was applied.
fn migrate_legacy_status(value: &mut Value) -> bool {
    let Some(obj) = value.as_object_mut() else {
        return false;
    };

    let agent_set = obj
        .get("agentStatus")
        .and_then(Value::as_str)
        .map(|s| !s.is_empty())
        .unwrap_or(false);
    if agent_set {
        return false;
    }

    let Some(status) = obj.get("status").and_then(Value::as_str) else {
        return false;
    };

    for (legacy, task_status, agent_status) in LEGACY_STATUS_MIGRATION {
        if status == legacy {
            obj.insert("status".to_string(), Value::String(task_status.to_string()));
            obj.insert(
                "agentStatus".to_string(),
                Value::String(agent_status.to_string()),
            );
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AgentStatus, Phase, TaskStatus};

    fn store() -> (tempfile::TempDir, TaskStore) {
        let tmp = tempfile::tempdir().unwrap();
        let store = TaskStore::new(tmp.path()).unwrap();
        (tmp, store)
    }

    #[test]
    fn test_save_assigns_sequential_ids() {
        let (_tmp, store) = store();

        for i in 0..3 {
            let mut task = Task::new("api-service", format!("task {}", i), Phase::Execute);
            store.save(&mut task).unwrap();
            assert_eq!(task.id, format!("t-{:03}", i + 1));
            assert!(task.created_at.is_some());
        }
    }

    #[test]
    fn test_ids_never_reused_after_delete() {
        let (_tmp, store) = store();

        for i in 0..5 {
            let mut task = Task::new("api-service", format!("task {}", i), Phase::Execute);
            store.save(&mut task).unwrap();
        }
        store.delete("t-003").unwrap();

        let mut task = Task::new("api-service", "after gap", Phase::Execute);
        store.save(&mut task).unwrap();
        assert_eq!(task.id, "t-006");
    }

    #[test]
    fn test_get_missing_is_not_found() {
        let (_tmp, store) = store();
        assert!(matches!(store.get("t-099"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_get_rejects_traversal_ids() {
        let (_tmp, store) = store();
        for bad in ["", ".", "..", "a/b", "a\\b"] {
            assert!(
                matches!(store.get(bad), Err(Error::NotFound(_))),
                "{:?} should read as not found",
                bad
            );
        }
    }

    #[test]
    fn test_delete_missing_is_not_found() {
        let (_tmp, store) = store();
        assert!(matches!(store.delete("t-001"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_list_sorted_and_corrupt_tolerant() {
        let (tmp, store) = store();

        let mut first = Task::new("api-service", "first", Phase::Execute);
        store.save(&mut first).unwrap();
        let mut second = Task::new("api-service", "second", Phase::Execute);
        store.save(&mut second).unwrap();

        // A corrupt file must not block listing.
        std::fs::write(tmp.path().join("tasks").join("t-garbage.json"), "{not json").unwrap();

        let tasks = store.list().unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].description, "first");
        assert_eq!(tasks[1].description, "second");
    }

    #[test]
    fn test_legacy_status_migration() {
        let (tmp, store) = store();

        let raw = r#"{
            "id": "t-001",
            "project": "api-service",
            "description": "Fix auth bug",
            "phase": "execute",
            "status": "thinking"
        }"#;
        std::fs::write(tmp.path().join("tasks").join("t-001.json"), raw).unwrap();

        // Reading twice yields the same migrated pair (idempotent).
        for _ in 0..2 {
            let task = store.get("t-001").unwrap();
            assert_eq!(task.status, TaskStatus::Running);
            assert_eq!(task.agent_status, AgentStatus::Thinking);
        }
    }

    #[test]
    fn test_legacy_idle_maps_to_backlog() {
        let (tmp, store) = store();

        let raw = r#"{"id":"t-001","project":"p","description":"d","phase":"plan","status":"idle"}"#;
        std::fs::write(tmp.path().join("tasks").join("t-001.json"), raw).unwrap();

        let task = store.get("t-001").unwrap();
        assert_eq!(task.status, TaskStatus::Backlog);
        assert_eq!(task.agent_status, AgentStatus::Idle);
    }

    #[test]
    fn test_migration_skips_records_with_agent_status() {
        let mut value: Value = serde_json::from_str(
            r#"{"status":"running","agentStatus":"waiting"}"#,
        )
        .unwrap();
        assert!(!migrate_legacy_status(&mut value));
        assert_eq!(value["status"], "running");
        assert_eq!(value["agentStatus"], "waiting");
    }

    #[test]
    fn test_save_preserves_created_at() {
        let (_tmp, store) = store();

        let mut task = Task::new("api-service", "Fix auth bug", Phase::Execute);
        store.save(&mut task).unwrap();
        let created = task.created_at;

        task.description = "Fix auth bug properly".to_string();
        store.save(&mut task).unwrap();
        assert_eq!(task.created_at, created);
    }
}
