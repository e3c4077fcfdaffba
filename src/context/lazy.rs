// src/context/lazy.rs

use std::path::{Path, PathBuf};

use tracing::debug;

use super::local::write_atomic;
use super::{resolve, transfer_err, RemoteContext};
use crate::errors::{JobtagError, Result};
use crate::fs::{FileSystem, RealFileSystem};
use crate::types::JobUuid;

/// Context whose remote root is the local root.
///
/// Used when the driver already runs on the cluster filesystem. Transfers
/// move nothing; they only confirm the task directories are there.
#[derive(Debug, Clone)]
pub struct LazyLocalContext<F: FileSystem = RealFileSystem> {
    fs: F,
    root: PathBuf,
    job_uuid: JobUuid,
}

impl LazyLocalContext<RealFileSystem> {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_fs(RealFileSystem, root, JobUuid::generate())
    }

    pub fn resume(root: impl Into<PathBuf>, job_uuid: JobUuid) -> Self {
        Self::with_fs(RealFileSystem, root, job_uuid)
    }
}

impl<F: FileSystem> LazyLocalContext<F> {
    pub fn with_fs(fs: F, root: impl Into<PathBuf>, job_uuid: JobUuid) -> Self {
        Self {
            fs,
            root: root.into(),
            job_uuid,
        }
    }

    fn check_dirs(&self, task_dirs: &[String]) -> Result<()> {
        for dir in task_dirs {
            let path = resolve(&self.root, dir)?;
            if !self.fs.is_dir(&path) {
                return Err(JobtagError::Transfer(format!(
                    "task directory {path:?} does not exist"
                )));
            }
        }
        Ok(())
    }
}

impl<F: FileSystem> RemoteContext for LazyLocalContext<F> {
    fn job_uuid(&self) -> &JobUuid {
        &self.job_uuid
    }

    fn local_root(&self) -> &Path {
        &self.root
    }

    fn remote_root(&self) -> &Path {
        &self.root
    }

    fn upload(&self, task_dirs: &[String], _files: &[String]) -> Result<()> {
        self.check_dirs(task_dirs)?;
        debug!(job_uuid = %self.job_uuid, "lazy context: upload is a no-op");
        Ok(())
    }

    fn download(&self, task_dirs: &[String], _patterns: &[String]) -> Result<()> {
        self.check_dirs(task_dirs)?;
        debug!(job_uuid = %self.job_uuid, "lazy context: download is a no-op");
        Ok(())
    }

    fn write_file(&self, rel: &str, content: &str) -> Result<()> {
        let path = resolve(&self.root, rel)?;
        write_atomic(&self.fs, &path, content.as_bytes()).map_err(transfer_err)
    }

    fn read_file(&self, rel: &str) -> Result<String> {
        let path = resolve(&self.root, rel)?;
        self.fs.read_to_string(&path).map_err(transfer_err)
    }

    fn remove_file(&self, rel: &str) -> Result<()> {
        let path = resolve(&self.root, rel)?;
        self.fs.remove_file(&path).map_err(transfer_err)
    }

    fn exists(&self, rel: &str) -> bool {
        resolve(&self.root, rel)
            .map(|p| self.fs.is_file(&p))
            .unwrap_or(false)
    }

    fn dir_exists(&self, rel: &str) -> bool {
        resolve(&self.root, rel)
            .map(|p| self.fs.is_dir(&p))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    #[test]
    fn upload_only_checks_task_dirs() {
        let fs = MockFileSystem::new();
        fs.add_file("loc/task0/test0", b"x");
        let ctx = LazyLocalContext::with_fs(fs.clone(), "loc", "j".parse().unwrap());

        ctx.upload(&["task0".to_string()], &["test0".to_string()]).unwrap();
        assert_eq!(ctx.remote_root(), ctx.local_root());

        let err = ctx
            .upload(&["task1".to_string()], &["test0".to_string()])
            .unwrap_err();
        assert!(matches!(err, JobtagError::Transfer(_)));
    }
}
