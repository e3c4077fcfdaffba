// tests/error_handling.rs

use std::io::Write;
use tempfile::NamedTempFile;
use jobtag::config::{load_and_validate, load_job};
use jobtag::errors::JobtagError;
use jobtag::types::{ContextKind, SchedulerKind};

fn toml_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn test_full_config_is_loaded() {
    let file = toml_file(
        r#"
[context]
kind = "lazy"
local_root = "work"

[scheduler]
kind = "shell"

[resources]
partition = "gpu"
nodes = 2
envs = { OMP_NUM_THREADS = "4" }

[tracker]
max_query_failures = 5
"#,
    );

    let cfg = load_and_validate(file.path()).unwrap();
    assert_eq!(cfg.context.kind, ContextKind::Lazy);
    assert_eq!(cfg.scheduler.kind, SchedulerKind::Shell);
    assert_eq!(cfg.resources.partition.as_deref(), Some("gpu"));
    assert_eq!(cfg.resources.nodes, 2);
    assert_eq!(cfg.tracker.max_query_failures, 5);
    assert_eq!(cfg.tracker.poll_interval_secs, 2);
}

#[test]
fn test_zero_query_failures_returns_config_error() {
    let file = toml_file("[tracker]\nmax_query_failures = 0\n");

    match load_and_validate(file.path()) {
        Err(JobtagError::ConfigError(msg)) => assert!(msg.contains("max_query_failures")),
        Err(e) => panic!("Expected ConfigError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_bad_env_name_returns_config_error() {
    let file = toml_file("[resources]\nenvs = { \"BAD-NAME\" = \"1\" }\n");
    let result = load_and_validate(file.path());
    assert!(matches!(result, Err(JobtagError::ConfigError(msg)) if msg.contains("BAD-NAME")));
}

#[test]
fn test_unknown_scheduler_returns_toml_error() {
    let file = toml_file("[scheduler]\nkind = \"pbs\"\n");
    let result = load_and_validate(file.path());
    assert!(matches!(result, Err(JobtagError::TomlError(_))));
}

#[test]
fn test_missing_explicit_config_returns_io_error() {
    let result = load_and_validate("/nonexistent/jobtag/config.toml");
    assert!(matches!(result, Err(JobtagError::IoError(_))));
}

#[test]
fn test_job_file_is_loaded() {
    let file = toml_file(
        r#"
forward_files = ["input.dat"]
backward_files = ["*.out"]

[[task]]
dir = "task0"
commands = ["touch test1", "touch test2"]

[[task]]
dir = "task1"
commands = ["touch test1"]
"#,
    );

    let job = load_job(file.path()).unwrap();
    assert_eq!(job.task_dirs(), vec!["task0".to_string(), "task1".to_string()]);
    assert_eq!(job.tasks[0].commands.len(), 2);
    assert_eq!(job.forward_files, vec!["input.dat".to_string()]);
    assert_eq!(job.backward_files, vec!["*.out".to_string()]);
}

#[test]
fn test_job_without_tasks_returns_config_error() {
    let file = toml_file("forward_files = []\n");
    let result = load_job(file.path());
    assert!(matches!(result, Err(JobtagError::ConfigError(msg)) if msg.contains("[[task]]")));
}

#[test]
fn test_duplicate_task_dir_returns_config_error() {
    let file = toml_file(
        r#"
[[task]]
dir = "task0"

[[task]]
dir = "task0/"
"#,
    );
    let result = load_job(file.path());
    assert!(matches!(result, Err(JobtagError::ConfigError(msg)) if msg.contains("more than once")));
}
