#![allow(dead_code)]

use std::path::PathBuf;

use jobtag::config::{ConfigFile, RawConfigFile};
use jobtag::types::{ContextKind, SchedulerKind, TaskSpec};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn local_context(mut self, local_root: impl Into<PathBuf>, remote_root: impl Into<PathBuf>) -> Self {
        self.config.context.kind = ContextKind::Local;
        self.config.context.local_root = local_root.into();
        self.config.context.remote_root = remote_root.into();
        self
    }

    pub fn lazy_context(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.context.kind = ContextKind::Lazy;
        self.config.context.local_root = root.into();
        self
    }

    pub fn scheduler(mut self, kind: SchedulerKind) -> Self {
        self.config.scheduler.kind = kind;
        self
    }

    pub fn partition(mut self, partition: &str) -> Self {
        self.config.resources.partition = Some(partition.to_string());
        self
    }

    pub fn parallel_tasks(mut self, val: bool) -> Self {
        self.config.script.parallel_tasks = val;
        self
    }

    pub fn max_query_failures(mut self, n: u32) -> Self {
        self.config.tracker.max_query_failures = n;
        self
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// `[(dir, [cmd, ...]), ...]` into task specs.
pub fn tasks(spec: &[(&str, &[&str])]) -> Vec<TaskSpec> {
    spec.iter()
        .map(|(dir, cmds)| TaskSpec::new(*dir, cmds.iter().map(|c| c.to_string()).collect()))
        .collect()
}
