//! # stage-foundation
//!
//! Foundation layer for Stagehand:
//! - Error: central error taxonomy shared by every layer
//! - Storage: directory-scoped JSON persistence (filesystem as database)
//! - Paths: hub data directory resolution

pub mod error;
pub mod paths;
pub mod storage;

pub use error::{Error, Result};
pub use paths::hub_dir;
pub use storage::JsonDir;
