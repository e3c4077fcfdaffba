// src/context/local.rs

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::{debug, info};

use super::{resolve, transfer_err, RemoteContext};
use crate::errors::{JobtagError, Result};
use crate::fs::{file_digest, FileSystem, RealFileSystem};
use crate::types::JobUuid;

/// Context with distinct local and remote roots on a filesystem both the
/// driver and the compute nodes can see.
#[derive(Debug, Clone)]
pub struct LocalContext<F: FileSystem = RealFileSystem> {
    fs: F,
    local_root: PathBuf,
    remote_root: PathBuf,
    job_uuid: JobUuid,
}

impl LocalContext<RealFileSystem> {
    /// New context for a fresh job.
    pub fn new(local_root: impl Into<PathBuf>, remote_root: impl Into<PathBuf>) -> Self {
        Self::with_fs(RealFileSystem, local_root, remote_root, JobUuid::generate())
    }

    /// Context for an existing job, e.g. to restart or poll it from another
    /// process.
    pub fn resume(
        local_root: impl Into<PathBuf>,
        remote_root: impl Into<PathBuf>,
        job_uuid: JobUuid,
    ) -> Self {
        Self::with_fs(RealFileSystem, local_root, remote_root, job_uuid)
    }
}

impl<F: FileSystem> LocalContext<F> {
    pub fn with_fs(
        fs: F,
        local_root: impl Into<PathBuf>,
        remote_root: impl Into<PathBuf>,
        job_uuid: JobUuid,
    ) -> Self {
        Self {
            fs,
            local_root: local_root.into(),
            remote_root: remote_root.into(),
            job_uuid,
        }
    }

    pub fn fs(&self) -> &F {
        &self.fs
    }
}

impl<F: FileSystem> RemoteContext for LocalContext<F> {
    fn job_uuid(&self) -> &JobUuid {
        &self.job_uuid
    }

    fn local_root(&self) -> &Path {
        &self.local_root
    }

    fn remote_root(&self) -> &Path {
        &self.remote_root
    }

    fn upload(&self, task_dirs: &[String], files: &[String]) -> Result<()> {
        let mut plan = Vec::with_capacity(task_dirs.len() * files.len());
        let mut remote_dirs = Vec::with_capacity(task_dirs.len());
        for dir in task_dirs {
            let local_dir = resolve(&self.local_root, dir)?;
            let remote_dir = resolve(&self.remote_root, dir)?;
            if !self.fs.is_dir(&local_dir) {
                return Err(JobtagError::Transfer(format!(
                    "local task directory {local_dir:?} does not exist"
                )));
            }
            remote_dirs.push(remote_dir.clone());
            for name in files {
                let src = resolve(&local_dir, name)?;
                if !self.fs.is_file(&src) {
                    return Err(JobtagError::Transfer(format!(
                        "cannot upload {name:?} for task {dir:?}: {src:?} does not exist"
                    )));
                }
                plan.push((src, resolve(&remote_dir, name)?));
            }
        }

        for dir in &remote_dirs {
            self.fs.create_dir_all(dir).map_err(transfer_err)?;
        }
        for (src, dst) in &plan {
            copy_verified(&self.fs, src, dst).map_err(transfer_err)?;
        }
        info!(
            job_uuid = %self.job_uuid,
            tasks = task_dirs.len(),
            files = plan.len(),
            "uploaded task files"
        );
        Ok(())
    }

    fn download(&self, task_dirs: &[String], patterns: &[String]) -> Result<()> {
        let (literals, globs) = split_patterns(patterns)?;

        let mut plan = Vec::new();
        for dir in task_dirs {
            let remote_dir = resolve(&self.remote_root, dir)?;
            let local_dir = resolve(&self.local_root, dir)?;
            if !self.fs.is_dir(&remote_dir) {
                return Err(JobtagError::Transfer(format!(
                    "remote task directory {remote_dir:?} does not exist"
                )));
            }

            for name in &literals {
                let src = resolve(&remote_dir, name)?;
                if !self.fs.is_file(&src) {
                    return Err(JobtagError::Transfer(format!(
                        "cannot download {name:?} for task {dir:?}: {src:?} does not exist"
                    )));
                }
                plan.push((src, resolve(&local_dir, name)?));
            }

            if let Some(set) = &globs {
                let entries = self.fs.read_dir(&remote_dir).map_err(transfer_err)?;
                for entry in entries {
                    let Some(name) = entry.file_name().and_then(|n| n.to_str()) else {
                        continue;
                    };
                    if self.fs.is_file(&entry) && set.is_match(name) {
                        let dst = local_dir.join(name);
                        plan.push((entry.clone(), dst));
                    }
                }
            }
        }

        for (src, dst) in &plan {
            copy_verified(&self.fs, src, dst).map_err(transfer_err)?;
        }
        info!(
            job_uuid = %self.job_uuid,
            tasks = task_dirs.len(),
            files = plan.len(),
            "downloaded task files"
        );
        Ok(())
    }

    fn write_file(&self, rel: &str, content: &str) -> Result<()> {
        let path = resolve(&self.remote_root, rel)?;
        write_atomic(&self.fs, &path, content.as_bytes()).map_err(transfer_err)
    }

    fn read_file(&self, rel: &str) -> Result<String> {
        let path = resolve(&self.remote_root, rel)?;
        self.fs.read_to_string(&path).map_err(transfer_err)
    }

    fn remove_file(&self, rel: &str) -> Result<()> {
        let path = resolve(&self.remote_root, rel)?;
        self.fs.remove_file(&path).map_err(transfer_err)
    }

    fn exists(&self, rel: &str) -> bool {
        resolve(&self.remote_root, rel)
            .map(|p| self.fs.is_file(&p))
            .unwrap_or(false)
    }

    fn dir_exists(&self, rel: &str) -> bool {
        resolve(&self.remote_root, rel)
            .map(|p| self.fs.is_dir(&p))
            .unwrap_or(false)
    }
}

/// Write to a `.part` sibling, then rename over `path`.
pub(crate) fn write_atomic(fs: &dyn FileSystem, path: &Path, contents: &[u8]) -> anyhow::Result<()> {
    let staging = part_path(path);
    fs.write(&staging, contents)?;
    fs.rename(&staging, path)
}

/// Copy `src` to `dst` through a staging file and check the digests match.
fn copy_verified(fs: &dyn FileSystem, src: &Path, dst: &Path) -> anyhow::Result<()> {
    let bytes = fs.read(src)?;
    let expected = file_digest(fs, src)?;
    let staging = part_path(dst);
    fs.write(&staging, &bytes)?;

    let actual = file_digest(fs, &staging)?;
    if actual != expected {
        let _ = fs.remove_file(&staging);
        return Err(anyhow!(
            "digest mismatch copying {:?} to {:?} ({} != {})",
            src,
            dst,
            actual,
            expected
        ));
    }

    fs.rename(&staging, dst)
        .with_context(|| format!("publishing {:?}", dst))?;
    debug!(src = ?src, dst = ?dst, digest = %expected, "copied file");
    Ok(())
}

fn part_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    path.with_file_name(name)
}

fn is_glob(pattern: &str) -> bool {
    pattern.contains(['*', '?', '[', '{'])
}

fn split_patterns(patterns: &[String]) -> Result<(Vec<&str>, Option<GlobSet>)> {
    let mut literals = Vec::new();
    let mut builder = GlobSetBuilder::new();
    let mut any_glob = false;

    for pattern in patterns {
        if is_glob(pattern) {
            let glob = Glob::new(pattern).map_err(|e| {
                JobtagError::Transfer(format!("invalid download pattern {pattern:?}: {e}"))
            })?;
            builder.add(glob);
            any_glob = true;
        } else {
            literals.push(pattern.as_str());
        }
    }

    let set = if any_glob {
        Some(
            builder
                .build()
                .map_err(|e| JobtagError::Transfer(format!("building download patterns: {e}")))?,
        )
    } else {
        None
    };
    Ok((literals, set))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    fn ctx(fs: &MockFileSystem) -> LocalContext<MockFileSystem> {
        LocalContext::with_fs(fs.clone(), "loc", "rmt", "job-1".parse().unwrap())
    }

    fn dirs(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn upload_copies_every_file_into_matching_remote_dir() {
        let fs = MockFileSystem::new();
        fs.add_file("loc/task0/test0", b"a");
        fs.add_file("loc/task1/test0", b"b");
        let ctx = ctx(&fs);

        ctx.upload(&dirs(&["task0", "task1"]), &dirs(&["test0"])).unwrap();

        assert_eq!(fs.read_to_string(Path::new("rmt/task0/test0")).unwrap(), "a");
        assert_eq!(fs.read_to_string(Path::new("rmt/task1/test0")).unwrap(), "b");
        assert!(!fs.exists(Path::new("rmt/task0/test0.part")));
    }

    #[test]
    fn upload_with_missing_source_copies_nothing() {
        let fs = MockFileSystem::new();
        fs.add_file("loc/task0/test0", b"a");
        let ctx = ctx(&fs);

        let err = ctx
            .upload(&dirs(&["task0", "task1"]), &dirs(&["test0"]))
            .unwrap_err();

        assert!(matches!(err, JobtagError::Transfer(_)));
        assert!(!fs.exists(Path::new("rmt/task0/test0")));
    }

    #[test]
    fn download_supports_globs_and_literals() {
        let fs = MockFileSystem::new();
        fs.add_file("rmt/task0/out.log", b"1");
        fs.add_file("rmt/task0/run.log", b"2");
        fs.add_file("rmt/task0/result", b"3");
        fs.add_file("rmt/task0/other", b"4");
        let ctx = ctx(&fs);

        ctx.download(&dirs(&["task0"]), &dirs(&["*.log", "result"])).unwrap();

        assert!(fs.is_file(Path::new("loc/task0/out.log")));
        assert!(fs.is_file(Path::new("loc/task0/run.log")));
        assert!(fs.is_file(Path::new("loc/task0/result")));
        assert!(!fs.exists(Path::new("loc/task0/other")));
    }

    #[test]
    fn download_from_missing_task_dir_is_a_transfer_error() {
        let fs = MockFileSystem::new();
        let ctx = ctx(&fs);
        let err = ctx.download(&dirs(&["task9"]), &dirs(&["x"])).unwrap_err();
        assert!(matches!(err, JobtagError::Transfer(msg) if msg.contains("task9")));
    }

    #[test]
    fn write_then_read_round_trips_and_leaves_no_staging_file() {
        let fs = MockFileSystem::new();
        let ctx = ctx(&fs);
        ctx.write_file("job-1.sub", "#!/bin/bash\n").unwrap();

        assert_eq!(ctx.read_file("job-1.sub").unwrap(), "#!/bin/bash\n");
        assert!(ctx.exists("job-1.sub"));
        assert!(!ctx.exists("job-1.sub.part"));
        assert!(!ctx.exists("../escape"));
    }
}
