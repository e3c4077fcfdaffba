// src/context/mod.rs

//! Remote contexts: the `(local_root, remote_root)` pair a job lives in.
//!
//! The dispatcher and tracker only talk to [`RemoteContext`]. Two
//! implementations are provided:
//!
//! - [`LocalContext`] copies task files between a local root and a remote
//!   root on a shared filesystem.
//! - [`LazyLocalContext`] works in place: the remote root *is* the local
//!   root, so transfers only check that the task directories exist.

use std::fmt::Debug;
use std::path::{Component, Path, PathBuf};

use crate::errors::{JobtagError, Result};
use crate::types::JobUuid;

pub mod lazy;
pub mod local;

pub use lazy::LazyLocalContext;
pub use local::LocalContext;

/// Contract between the job manager and the file-transfer layer.
///
/// All `rel` arguments are relative to [`remote_root`](Self::remote_root).
pub trait RemoteContext: Send + Sync + Debug {
    /// Identity of the job this context addresses.
    fn job_uuid(&self) -> &JobUuid;

    fn local_root(&self) -> &Path;

    /// Directory on the shared filesystem the scheduler runs the job from.
    fn remote_root(&self) -> &Path;

    /// Push `files` from each local task directory to the matching remote one.
    ///
    /// Either every source exists and is copied, or nothing is copied and a
    /// [`JobtagError::Transfer`] is returned.
    fn upload(&self, task_dirs: &[String], files: &[String]) -> Result<()>;

    /// Pull files matching `patterns` (literal names or globs) back into the
    /// local task directories.
    fn download(&self, task_dirs: &[String], patterns: &[String]) -> Result<()>;

    fn write_file(&self, rel: &str, content: &str) -> Result<()>;

    fn read_file(&self, rel: &str) -> Result<String>;

    fn remove_file(&self, rel: &str) -> Result<()>;

    /// Whether a remote file exists. Never fails: a missing or unreadable
    /// path simply reads as absent.
    fn exists(&self, rel: &str) -> bool;

    fn dir_exists(&self, rel: &str) -> bool;
}

/// Join `rel` onto `root`, refusing absolute paths and `..` so a task
/// directory can never address anything outside its root.
pub(crate) fn resolve(root: &Path, rel: &str) -> Result<PathBuf> {
    let rel_path = Path::new(rel);
    for component in rel_path.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            _ => {
                return Err(JobtagError::Transfer(format!(
                    "path {rel:?} must be relative and stay inside {root:?}"
                )));
            }
        }
    }
    Ok(root.join(rel_path))
}

pub(crate) fn transfer_err(err: anyhow::Error) -> JobtagError {
    JobtagError::Transfer(format!("{err:#}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_rejects_escaping_paths() {
        let root = Path::new("/remote");
        assert!(resolve(root, "../etc").is_err());
        assert!(resolve(root, "/etc/passwd").is_err());
        assert!(resolve(root, "task0/../../x").is_err());
        assert_eq!(
            resolve(root, "task0/tag_0_finished").unwrap(),
            PathBuf::from("/remote/task0/tag_0_finished")
        );
    }
}
