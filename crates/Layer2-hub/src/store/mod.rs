//! Filesystem JSON stores
//!
//! One directory per entity kind, one file per record. Both stores write
//! through the atomic-rename path so a crash never leaves a torn record.

mod project;
mod task;

pub use project::ProjectStore;
pub use task::TaskStore;

/// Returns true if `id` is safe to use as a filename component.
/// Rejects path-traversal shapes in the filesystem-as-database scheme.
pub(crate) fn valid_file_stem(id: &str) -> bool {
    !id.is_empty() && id != "." && id != ".." && !id.contains('/') && !id.contains('\\')
}
