//! Stand-in for the execution side when the remote filesystem is a
//! `MockFileSystem`: writes the same artifacts the generated script would.

use std::path::{Path, PathBuf};

use jobtag::fs::mock::MockFileSystem;
use jobtag::tags::TagLayout;
use jobtag::types::TaskSpec;

pub struct ExecutionSim {
    fs: MockFileSystem,
    remote_root: PathBuf,
    layout: TagLayout,
}

impl ExecutionSim {
    pub fn new(fs: MockFileSystem, remote_root: impl AsRef<Path>, layout: TagLayout) -> Self {
        Self {
            fs,
            remote_root: remote_root.as_ref().to_path_buf(),
            layout,
        }
    }

    fn touch(&self, rel: &str) {
        self.fs.add_file(self.remote_root.join(rel), Vec::new());
    }

    /// The script's first line: record the scheduler job id.
    pub fn start(&self, job_id: &str) {
        self.fs
            .add_file(self.remote_root.join(self.layout.job_id_marker()), job_id.as_bytes().to_vec());
    }

    /// Mark slots `0..slots` of `task` finished, plus the task marker when
    /// that covers every command.
    pub fn complete_slots(&self, task: &TaskSpec, slots: usize) {
        for slot in 0..slots.min(task.commands.len()) {
            self.touch(&self.layout.slot_marker(&task.dir, slot));
        }
        if slots >= task.commands.len() {
            self.touch(&self.layout.task_marker(&task.dir));
        }
    }

    /// Run every task to completion and write the whole-job marker.
    pub fn finish(&self, tasks: &[TaskSpec]) {
        for task in tasks {
            self.complete_slots(task, task.commands.len());
        }
        self.touch(&self.layout.job_marker());
    }
}
