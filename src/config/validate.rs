// src/config/validate.rs

use std::collections::HashSet;
use std::path::{Component, Path};

use crate::config::model::{ConfigFile, JobFile, RawConfigFile, RawJobFile};
use crate::errors::{JobtagError, Result};
use crate::types::TaskSpec;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::JobtagError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

impl TryFrom<RawJobFile> for JobFile {
    type Error = crate::errors::JobtagError;

    fn try_from(raw: RawJobFile) -> std::result::Result<Self, Self::Error> {
        validate_tasks(&raw.task)?;
        Ok(JobFile::new_unchecked(raw))
    }
}

pub fn validate_config(cfg: &RawConfigFile) -> Result<()> {
    validate_resources(cfg)?;
    validate_script(cfg)?;
    validate_tracker(cfg)?;
    Ok(())
}

fn validate_resources(cfg: &RawConfigFile) -> Result<()> {
    if cfg.resources.nodes == 0 {
        return Err(JobtagError::ConfigError(
            "[resources].nodes must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.resources.ntasks_per_node == 0 {
        return Err(JobtagError::ConfigError(
            "[resources].ntasks_per_node must be >= 1 (got 0)".to_string(),
        ));
    }
    for key in cfg.resources.envs.keys() {
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(JobtagError::ConfigError(format!(
                "[resources].envs has invalid variable name '{}'",
                key
            )));
        }
    }
    Ok(())
}

fn validate_script(cfg: &RawConfigFile) -> Result<()> {
    for (field, value) in [("outlog", &cfg.script.outlog), ("errlog", &cfg.script.errlog)] {
        if value.is_empty() {
            return Err(JobtagError::ConfigError(format!(
                "[script].{field} must not be empty"
            )));
        }
        if value.contains('/') {
            return Err(JobtagError::ConfigError(format!(
                "[script].{field} must be a plain file name (got '{value}')"
            )));
        }
    }
    Ok(())
}

fn validate_tracker(cfg: &RawConfigFile) -> Result<()> {
    if cfg.tracker.max_query_failures == 0 {
        return Err(JobtagError::ConfigError(
            "[tracker].max_query_failures must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.tracker.poll_interval_secs == 0 {
        return Err(JobtagError::ConfigError(
            "[tracker].poll_interval_secs must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

/// Check a task list before it is turned into a script: at least one task,
/// every directory relative and inside the root, no directory listed twice.
pub fn validate_tasks(tasks: &[TaskSpec]) -> Result<()> {
    if tasks.is_empty() {
        return Err(JobtagError::ConfigError(
            "job must contain at least one [[task]]".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for task in tasks {
        let dir = task.dir.trim_end_matches('/');
        if dir.is_empty() {
            return Err(JobtagError::ConfigError(
                "task dir must not be empty".to_string(),
            ));
        }
        let escapes = Path::new(dir)
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(JobtagError::ConfigError(format!(
                "task dir '{}' must be relative to the remote root",
                task.dir
            )));
        }
        if let Some(slot) = task.commands.iter().position(|c| c.trim().is_empty()) {
            return Err(JobtagError::ConfigError(format!(
                "task dir '{}' has an empty command at slot {}",
                task.dir, slot
            )));
        }
        if !seen.insert(dir) {
            return Err(JobtagError::ConfigError(format!(
                "task dir '{}' is listed more than once",
                task.dir
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(ConfigFile::try_from(RawConfigFile::default()).is_ok());
    }

    #[test]
    fn zero_nodes_is_rejected() {
        let mut raw = RawConfigFile::default();
        raw.resources.nodes = 0;
        let err = ConfigFile::try_from(raw).unwrap_err();
        assert!(matches!(err, JobtagError::ConfigError(msg) if msg.contains("nodes")));
    }

    #[test]
    fn log_names_must_be_plain_file_names() {
        let mut raw = RawConfigFile::default();
        raw.script.outlog = "../log".to_string();
        assert!(ConfigFile::try_from(raw).is_err());
    }

    #[test]
    fn duplicate_and_escaping_task_dirs_are_rejected() {
        let dup = TaskSpec::uniform(&["a", "a/"], &["true"]);
        assert!(validate_tasks(&dup).is_err());

        let up = vec![TaskSpec::new("../a", vec![])];
        assert!(validate_tasks(&up).is_err());

        let abs = vec![TaskSpec::new("/tmp/a", vec![])];
        assert!(validate_tasks(&abs).is_err());

        assert!(validate_tasks(&[]).is_err());

        let blank = vec![TaskSpec::new("a", vec!["true".to_string(), "  ".to_string()])];
        let err = validate_tasks(&blank).unwrap_err();
        assert!(matches!(err, JobtagError::ConfigError(msg) if msg.contains("slot 1")));
        assert!(validate_tasks(&TaskSpec::uniform(&["a", "b"], &["true"])).is_ok());
    }
}
