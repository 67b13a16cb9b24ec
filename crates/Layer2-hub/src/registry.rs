//! Legacy project registry
//!
//! Older installs keep all project definitions in one aggregate
//! `projects.yaml` file. The registry reads that file; it has no write
//! path and coexists with the per-file [`ProjectStore`]. The
//! [`ProjectSource`] trait lets callers route over either source.

use crate::model::Project;
use crate::store::ProjectStore;
use serde::Deserialize;
use stage_foundation::{Error, Result};
use std::path::{Path, PathBuf};

/// Read capability over a set of project definitions.
pub trait ProjectSource: Send + Sync {
    fn list_projects(&self) -> Result<Vec<Project>>;
}

/// YAML structure of the aggregate registry file.
#[derive(Debug, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    projects: Vec<Project>,
}

/// Read-only access to the legacy `projects.yaml` registry.
pub struct ProjectRegistry {
    file_path: PathBuf,
}

impl ProjectRegistry {
    /// Creates a registry reading from `<base>/projects.yaml`.
    pub fn new(base: impl AsRef<Path>) -> Self {
        Self {
            file_path: base.as_ref().join("projects.yaml"),
        }
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// Returns all projects from the registry file. A missing file is an
    /// empty registry, not an error.
    pub fn list(&self) -> Result<Vec<Project>> {
        let content = match std::fs::read_to_string(&self.file_path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(Error::Storage(format!(
                    "read {}: {}",
                    self.file_path.display(),
                    e
                )));
            }
        };
        let file: RegistryFile = serde_yaml::from_str(&content)
            .map_err(|e| Error::Storage(format!("parse {}: {}", self.file_path.display(), e)))?;
        Ok(file.projects)
    }
}

impl ProjectSource for ProjectRegistry {
    fn list_projects(&self) -> Result<Vec<Project>> {
        self.list()
    }
}

impl ProjectSource for ProjectStore {
    fn list_projects(&self) -> Result<Vec<Project>> {
        self.list()
    }
}
