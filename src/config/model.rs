// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::script::ScriptOptions;
use crate::types::{ContextKind, SchedulerKind, TaskSpec};

/// Runtime configuration as read from `Jobtag.toml`.
///
/// ```toml
/// [context]
/// kind = "local"
/// local_root = "loc"
/// remote_root = "/scratch/me/rmt"
///
/// [scheduler]
/// kind = "slurm"
///
/// [resources]
/// partition = "cpu"
/// time_limit = "1:00:00"
///
/// [script]
/// outlog = "log"
/// errlog = "err"
///
/// [tracker]
/// max_query_failures = 3
/// poll_interval_secs = 2
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub context: ContextSection,

    #[serde(default)]
    pub scheduler: SchedulerSection,

    #[serde(default)]
    pub resources: Resources,

    #[serde(default)]
    pub script: ScriptSection,

    #[serde(default)]
    pub tracker: TrackerSection,
}

/// Validated configuration. Only constructed through
/// `ConfigFile::try_from(RawConfigFile)`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub context: ContextSection,
    pub scheduler: SchedulerSection,
    pub resources: Resources,
    pub script: ScriptSection,
    pub tracker: TrackerSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            context: raw.context,
            scheduler: raw.scheduler,
            resources: raw.resources,
            script: raw.script,
            tracker: raw.tracker,
        }
    }

    pub fn script_options(&self) -> ScriptOptions {
        ScriptOptions {
            outlog: self.script.outlog.clone(),
            errlog: self.script.errlog.clone(),
            parallel_tasks: self.script.parallel_tasks,
            module_list: self.resources.module_list.clone(),
            source_list: self.resources.source_list.clone(),
            envs: self.resources.envs.clone(),
        }
    }
}

/// `[context]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ContextSection {
    #[serde(default)]
    pub kind: ContextKind,

    /// Where task directories are prepared on the driver side.
    #[serde(default = "default_local_root")]
    pub local_root: PathBuf,

    /// Where task directories live on the shared filesystem. Ignored for
    /// `kind = "lazy"`, which works in `local_root` directly.
    #[serde(default = "default_remote_root")]
    pub remote_root: PathBuf,
}

fn default_local_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_remote_root() -> PathBuf {
    PathBuf::from("remote")
}

impl Default for ContextSection {
    fn default() -> Self {
        Self {
            kind: ContextKind::default(),
            local_root: default_local_root(),
            remote_root: default_remote_root(),
        }
    }
}

/// `[scheduler]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SchedulerSection {
    #[serde(default)]
    pub kind: SchedulerKind,

    /// Extra arguments passed verbatim to the submit command (`sbatch`).
    #[serde(default)]
    pub submit_args: Vec<String>,
}

/// `[resources]` section: what the job asks the scheduler for, plus the
/// environment set up before any task runs.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Resources {
    #[serde(default)]
    pub partition: Option<String>,

    #[serde(default = "default_one")]
    pub nodes: u32,

    #[serde(default = "default_one")]
    pub ntasks_per_node: u32,

    #[serde(default)]
    pub cpus_per_task: Option<u32>,

    #[serde(default)]
    pub gpus_per_node: Option<u32>,

    #[serde(default = "default_time_limit")]
    pub time_limit: String,

    #[serde(default)]
    pub mem: Option<String>,

    #[serde(default)]
    pub qos: Option<String>,

    #[serde(default)]
    pub account: Option<String>,

    #[serde(default)]
    pub constraint: Option<String>,

    /// Raw directive values appended after the generated ones, e.g.
    /// `"--exclusive"`.
    #[serde(default)]
    pub extra_directives: Vec<String>,

    #[serde(default)]
    pub module_list: Vec<String>,

    #[serde(default)]
    pub source_list: Vec<String>,

    #[serde(default)]
    pub envs: BTreeMap<String, String>,
}

fn default_one() -> u32 {
    1
}

fn default_time_limit() -> String {
    "0:30:00".to_string()
}

impl Default for Resources {
    fn default() -> Self {
        Self {
            partition: None,
            nodes: default_one(),
            ntasks_per_node: default_one(),
            cpus_per_task: None,
            gpus_per_node: None,
            time_limit: default_time_limit(),
            mem: None,
            qos: None,
            account: None,
            constraint: None,
            extra_directives: Vec::new(),
            module_list: Vec::new(),
            source_list: Vec::new(),
            envs: BTreeMap::new(),
        }
    }
}

/// `[script]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ScriptSection {
    #[serde(default = "default_outlog")]
    pub outlog: String,

    #[serde(default = "default_errlog")]
    pub errlog: String,

    /// Run task directories concurrently inside the job.
    #[serde(default = "default_true")]
    pub parallel_tasks: bool,
}

fn default_outlog() -> String {
    "log".to_string()
}

fn default_errlog() -> String {
    "err".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for ScriptSection {
    fn default() -> Self {
        Self {
            outlog: default_outlog(),
            errlog: default_errlog(),
            parallel_tasks: default_true(),
        }
    }
}

/// `[tracker]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TrackerSection {
    /// Consecutive failed scheduler queries tolerated before a job is
    /// reported as `failed-unknown`.
    #[serde(default = "default_max_query_failures")]
    pub max_query_failures: u32,

    /// Poll cadence used by `jobtag wait`.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

fn default_max_query_failures() -> u32 {
    3
}

fn default_poll_interval_secs() -> u64 {
    2
}

impl TrackerSection {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl Default for TrackerSection {
    fn default() -> Self {
        Self {
            max_query_failures: default_max_query_failures(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

/// Job description file as read from TOML.
///
/// ```toml
/// forward_files = ["input.dat"]
/// backward_files = ["*.out"]
///
/// [[task]]
/// dir = "task0"
/// commands = ["./prepare", "./run"]
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawJobFile {
    #[serde(default)]
    pub forward_files: Vec<String>,

    #[serde(default)]
    pub backward_files: Vec<String>,

    #[serde(default)]
    pub task: Vec<TaskSpec>,
}

/// Validated job description.
#[derive(Debug, Clone)]
pub struct JobFile {
    pub forward_files: Vec<String>,
    pub backward_files: Vec<String>,
    pub tasks: Vec<TaskSpec>,
}

impl JobFile {
    pub(crate) fn new_unchecked(raw: RawJobFile) -> Self {
        Self {
            forward_files: raw.forward_files,
            backward_files: raw.backward_files,
            tasks: raw.task,
        }
    }

    pub fn task_dirs(&self) -> Vec<String> {
        self.tasks.iter().map(|t| t.dir.clone()).collect()
    }
}
