//! Project store
//!
//! Each project lives in `<base>/projects/<name>.json` with the project
//! name as the file key.

use crate::model::Project;
use crate::store::valid_file_stem;
use chrono::Utc;
use parking_lot::RwLock;
use stage_foundation::{Error, JsonDir, Result};
use std::path::Path;

/// Filesystem JSON-based CRUD for [`Project`] records.
pub struct ProjectStore {
    lock: RwLock<()>,
    files: JsonDir,
}

impl ProjectStore {
    /// Creates a ProjectStore backed by `<base>/projects/`, creating the
    /// directory if needed.
    pub fn new(base: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            lock: RwLock::new(()),
            files: JsonDir::new(base.as_ref().join("projects"))?,
        })
    }

    /// Returns all projects sorted by creation time (oldest first),
    /// skipping any file that fails to parse.
    pub fn list(&self) -> Result<Vec<Project>> {
        let _guard = self.lock.read();

        let mut projects = Vec::new();
        for stem in self.files.json_stems()? {
            match self.files.load::<Project>(&stem) {
                Ok(project) => projects.push(project),
                Err(_) => continue, // skip corrupt files
            }
        }

        projects.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(projects)
    }

    /// Retrieves a single project by name. A structurally invalid name
    /// reads as NotFound: no file could ever exist under it.
    pub fn get(&self, name: &str) -> Result<Project> {
        if !valid_file_stem(name) {
            return Err(Error::not_found("project", name));
        }
        let _guard = self.lock.read();
        self.files.load(name).map_err(|e| match e {
            Error::NotFound(_) => Error::not_found("project", name),
            other => other,
        })
    }

    /// Persists a project. The name is required and used as the file key.
    /// Sets `created_at` on first save and always refreshes `updated_at`.
    pub fn save(&self, project: &mut Project) -> Result<()> {
        if !valid_file_stem(&project.name) {
            return Err(Error::InvalidArgument(format!(
                "invalid project name: {:?}",
                project.name
            )));
        }

        let _guard = self.lock.write();

        if project.created_at.is_none() {
            project.created_at = Some(Utc::now());
        }
        project.updated_at = Some(Utc::now());

        self.files.save(&project.name, project)
    }

    /// Removes a project by name.
    pub fn delete(&self, name: &str) -> Result<()> {
        if !valid_file_stem(name) {
            return Err(Error::not_found("project", name));
        }
        let _guard = self.lock.write();
        self.files.remove(name).map_err(|e| match e {
            Error::NotFound(_) => Error::not_found("project", name),
            other => other,
        })
    }

    /// Whether a project with this name already exists (for Conflict
    /// checks before create).
    pub fn exists(&self, name: &str) -> bool {
        valid_file_stem(name) && {
            let _guard = self.lock.read();
            self.files.exists(name)
        }
    }
}
