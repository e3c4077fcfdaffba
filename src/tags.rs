// src/tags.rs

//! Completion tag protocol.
//!
//! Every artifact below lives on the remote filesystem and is only ever
//! created, never rewritten or removed, by the execution side:
//!
//! | artifact                         | location    | content          |
//! |----------------------------------|-------------|------------------|
//! | `tag_{i}_finished`               | task dir    | empty            |
//! | `tag_finished`                   | task dir    | empty            |
//! | `{job_uuid}_tag_finished`        | remote root | empty            |
//! | `{job_uuid}_job_id`              | remote root | scheduler job id |
//!
//! Paths returned here are relative to the remote root, with `/` separators,
//! so the same string can be used in a generated shell script and handed to
//! a [`RemoteContext`](crate::context::RemoteContext).

use crate::types::JobUuid;

pub const TASK_FINISHED_TAG: &str = "tag_finished";

/// Name of the per-slot marker inside a task directory.
pub fn slot_tag(slot: usize) -> String {
    format!("tag_{slot}_finished")
}

/// Artifact names for one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagLayout {
    job_uuid: JobUuid,
}

impl TagLayout {
    pub fn new(job_uuid: JobUuid) -> Self {
        Self { job_uuid }
    }

    pub fn job_uuid(&self) -> &JobUuid {
        &self.job_uuid
    }

    pub fn slot_marker(&self, task_dir: &str, slot: usize) -> String {
        join(task_dir, &slot_tag(slot))
    }

    pub fn task_marker(&self, task_dir: &str) -> String {
        join(task_dir, TASK_FINISHED_TAG)
    }

    pub fn job_marker(&self) -> String {
        format!("{}_tag_finished", self.job_uuid)
    }

    pub fn job_id_marker(&self) -> String {
        format!("{}_job_id", self.job_uuid)
    }

    /// Staging name the script writes before renaming onto
    /// [`job_id_marker`](Self::job_id_marker).
    pub fn job_id_staging(&self) -> String {
        format!("{}_job_id.tmp", self.job_uuid)
    }

    pub fn script_name(&self) -> String {
        format!("{}.sub", self.job_uuid)
    }
}

fn join(dir: &str, name: &str) -> String {
    let dir = dir.trim_end_matches('/');
    if dir.is_empty() || dir == "." {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> TagLayout {
        TagLayout::new("abc-123".parse().unwrap())
    }

    #[test]
    fn job_level_markers_are_namespaced_by_uuid() {
        let l = layout();
        assert_eq!(l.job_marker(), "abc-123_tag_finished");
        assert_eq!(l.job_id_marker(), "abc-123_job_id");
        assert_eq!(l.script_name(), "abc-123.sub");
    }

    #[test]
    fn task_markers_live_inside_the_task_dir() {
        let l = layout();
        assert_eq!(l.slot_marker("task0", 1), "task0/tag_1_finished");
        assert_eq!(l.slot_marker("nested/task1/", 0), "nested/task1/tag_0_finished");
        assert_eq!(l.task_marker("task0"), "task0/tag_finished");
        assert_eq!(l.task_marker("."), "tag_finished");
    }
}
