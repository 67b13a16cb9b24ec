//! Hub data directory resolution

use crate::{Error, Result};
use std::path::PathBuf;

/// Returns the hub data directory (`~/.stagehand/hub`).
///
/// All persistent state (tasks, projects, the legacy registry file) lives
/// under this directory. Stores accept an explicit base path, so this is a
/// convenience for production wiring only.
pub fn hub_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| Error::Storage("cannot resolve home directory".to_string()))?;
    Ok(home.join(".stagehand").join("hub"))
}
