//! Directory-scoped JSON persistence
//!
//! Every record is one pretty-printed JSON file named `<stem>.json`. Writes
//! go to a temp file first and are renamed into place, so a crash mid-write
//! never leaves a reader with a half-written record.

use crate::{Error, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};

/// JSON file store rooted at a single directory.
#[derive(Debug, Clone)]
pub struct JsonDir {
    dir: PathBuf,
}

impl JsonDir {
    /// Opens (and creates if needed) the given directory.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .map_err(|e| Error::Storage(format!("create {}: {}", dir.display(), e)))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_path(&self, stem: &str) -> PathBuf {
        self.dir.join(format!("{}.json", stem))
    }

    /// Loads one record. Missing file maps to `NotFound`; a file that
    /// exists but cannot be read or parsed maps to `Storage`.
    pub fn load<T: DeserializeOwned>(&self, stem: &str) -> Result<T> {
        let path = self.file_path(stem);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotFound(stem.to_string()));
            }
            Err(e) => {
                return Err(Error::Storage(format!("read {}: {}", path.display(), e)));
            }
        };
        serde_json::from_str(&content)
            .map_err(|e| Error::Storage(format!("parse {}: {}", path.display(), e)))
    }

    /// Persists one record via write-to-temp + atomic rename.
    pub fn save<T: Serialize>(&self, stem: &str, record: &T) -> Result<()> {
        let path = self.file_path(stem);
        let tmp = self.dir.join(format!("{}.json.tmp", stem));

        let content = serde_json::to_string_pretty(record)
            .map_err(|e| Error::Storage(format!("serialize {}: {}", stem, e)))?;
        std::fs::write(&tmp, content)
            .map_err(|e| Error::Storage(format!("write {}: {}", tmp.display(), e)))?;
        std::fs::rename(&tmp, &path)
            .map_err(|e| Error::Storage(format!("rename {}: {}", path.display(), e)))
    }

    /// Removes one record. Missing file maps to `NotFound`.
    pub fn remove(&self, stem: &str) -> Result<()> {
        let path = self.file_path(stem);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(stem.to_string()))
            }
            Err(e) => Err(Error::Storage(format!("remove {}: {}", path.display(), e))),
        }
    }

    pub fn exists(&self, stem: &str) -> bool {
        self.file_path(stem).exists()
    }

    /// Returns the stems of all `.json` files in the directory, sorted.
    /// Temp files and subdirectories are skipped.
    pub fn json_stems(&self) -> Result<Vec<String>> {
        let entries = std::fs::read_dir(&self.dir)
            .map_err(|e| Error::Storage(format!("read {}: {}", self.dir.display(), e)))?;

        let mut stems = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::Storage(format!("read dir entry: {}", e)))?;
            if entry.path().is_dir() {
                continue;
            }
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(stem) = name.strip_suffix(".json") {
                stems.push(stem.to_string());
            }
        }
        stems.sort();
        Ok(stems)
    }
}
