// src/types.rs

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use uuid::Uuid;

/// Lifecycle of one scheduler submission as seen by the driver.
///
/// `FailedUnknown` is the terminal state for a job the scheduler no longer
/// knows about while the whole-job marker is still absent: cancellation or a
/// crash, never success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStatus {
    Unsubmitted,
    Submitted,
    Running,
    Finished,
    FailedUnknown,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Finished | JobStatus::FailedUnknown)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Unsubmitted => "unsubmitted",
            JobStatus::Submitted => "submitted",
            JobStatus::Running => "running",
            JobStatus::Finished => "finished",
            JobStatus::FailedUnknown => "failed-unknown",
        };
        f.write_str(s)
    }
}

/// What the scheduler reports about a job id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    /// Accepted but not yet executing (pending, configuring, held, ...).
    Queued,
    /// Executing or completing.
    Running,
    /// The scheduler no longer tracks the job.
    Gone,
}

/// Process-assigned identity of a job; namespaces every job-level artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobUuid(String);

impl JobUuid {
    pub fn generate() -> Self {
        JobUuid(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for JobUuid {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("job uuid must not be empty".to_string());
        }
        if !s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(format!(
                "invalid job uuid {s:?} (expected ASCII letters, digits, '-' or '_')"
            ));
        }
        Ok(JobUuid(s.to_string()))
    }
}

/// One task directory and its ordered command sequence.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TaskSpec {
    /// Directory relative to the remote root.
    pub dir: String,
    /// Commands run in order inside `dir`; slot `i` is `commands[i]`.
    #[serde(default)]
    pub commands: Vec<String>,
}

impl TaskSpec {
    pub fn new(dir: impl Into<String>, commands: Vec<String>) -> Self {
        Self {
            dir: dir.into(),
            commands,
        }
    }

    /// The same command sequence applied to every directory.
    pub fn uniform<D, C>(dirs: &[D], commands: &[C]) -> Vec<TaskSpec>
    where
        D: AsRef<str>,
        C: AsRef<str>,
    {
        let commands: Vec<String> = commands.iter().map(|c| c.as_ref().to_string()).collect();
        dirs.iter()
            .map(|d| TaskSpec::new(d.as_ref(), commands.clone()))
            .collect()
    }
}

/// Kind of remote context to build from config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContextKind {
    /// Separate local and remote roots; files are copied between them.
    #[default]
    Local,
    /// The remote root is the local root; transfers are no-ops.
    Lazy,
}

/// Scheduler backend to build from config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerKind {
    #[default]
    Slurm,
    Shell,
}

impl FromStr for SchedulerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "slurm" => Ok(SchedulerKind::Slurm),
            "shell" => Ok(SchedulerKind::Shell),
            other => Err(format!(
                "invalid scheduler kind: {other} (expected \"slurm\" or \"shell\")"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_copies_commands_into_every_dir() {
        let tasks = TaskSpec::uniform(&["task0", "task1"], &["touch a", "touch b"]);
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[1].dir, "task1");
        assert_eq!(tasks[1].commands, vec!["touch a", "touch b"]);
    }

    #[test]
    fn job_uuid_rejects_path_characters() {
        assert!("abc/def".parse::<JobUuid>().is_err());
        assert!("".parse::<JobUuid>().is_err());
        let id: JobUuid = " 1234-abcd ".parse().unwrap();
        assert_eq!(id.as_str(), "1234-abcd");
    }

    #[test]
    fn generated_uuids_differ() {
        assert_ne!(JobUuid::generate(), JobUuid::generate());
    }

    #[test]
    fn status_display_matches_driver_vocabulary() {
        assert_eq!(JobStatus::FailedUnknown.to_string(), "failed-unknown");
        assert!(JobStatus::Finished.is_terminal());
        assert!(!JobStatus::Submitted.is_terminal());
    }
}
