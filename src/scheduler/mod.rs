// src/scheduler/mod.rs

//! Scheduler capability interface.
//!
//! The dispatcher and tracker talk to a [`Scheduler`] instead of invoking a
//! particular scheduler's CLI. New schedulers are added by implementing the
//! trait; nothing in the tracker changes.
//!
//! - [`slurm`] submits with `sbatch`, queries with `squeue` and cancels with
//!   `scancel`.
//! - [`shell`] runs the script as a local background process group. Useful
//!   on a workstation and in tests.

use std::fmt::Debug;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;

use crate::config::{ConfigFile, Resources};
use crate::errors::Result;
use crate::script::ScriptDialect;
use crate::types::{QueueState, SchedulerKind};

pub mod shell;
pub mod slurm;

pub use shell::Shell;
pub use slurm::Slurm;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What the scheduler hands back when it accepts a script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitToken {
    /// Raw acceptance output, kept for logging.
    pub raw: String,
    /// The job id, when the acceptance output already carries it.
    pub job_id: Option<String>,
}

/// Trait abstracting a cluster job scheduler.
///
/// Production code uses [`Slurm`] or [`Shell`]; tests provide scripted fakes.
pub trait Scheduler: Send + Sync + Debug {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Scheduler-specific script header for the given resources.
    fn dialect(&self, resources: &Resources) -> ScriptDialect;

    /// Hand `script_name` (a file in `work_dir`) to the scheduler. The job
    /// must start with `work_dir` as its working directory.
    ///
    /// Fails with [`JobtagError::SubmissionRejected`](crate::errors::JobtagError::SubmissionRejected)
    /// if the scheduler refuses the job.
    fn submit<'a>(&'a self, work_dir: &'a Path, script_name: &'a str)
        -> BoxFuture<'a, Result<SubmitToken>>;

    /// Current queue state of `job_id`.
    ///
    /// Fails with [`JobtagError::TransientQueryFailure`](crate::errors::JobtagError::TransientQueryFailure)
    /// when the answer is unknown (scheduler unreachable, unparsable output).
    fn query<'a>(&'a self, job_id: &'a str) -> BoxFuture<'a, Result<QueueState>>;

    /// Ask the scheduler to kill `job_id`. Only operators call this; the
    /// tracker never cancels on its own.
    fn cancel<'a>(&'a self, job_id: &'a str) -> BoxFuture<'a, Result<()>>;
}

/// Build the scheduler selected by `[scheduler].kind`.
pub fn from_config(cfg: &ConfigFile) -> Arc<dyn Scheduler> {
    match cfg.scheduler.kind {
        SchedulerKind::Slurm => Arc::new(Slurm::new(cfg.scheduler.submit_args.clone())),
        SchedulerKind::Shell => Arc::new(Shell::new()),
    }
}
