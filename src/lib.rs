// src/lib.rs

pub mod cli;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod errors;
pub mod fs;
pub mod logging;
pub mod scheduler;
pub mod script;
pub mod tags;
pub mod tracker;
pub mod types;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use tracing::{debug, info};

use crate::cli::{CliArgs, Command};
use crate::config::{load_and_validate, load_job, ConfigFile};
use crate::context::{LazyLocalContext, LocalContext, RemoteContext};
use crate::dispatch::Dispatcher;
use crate::tracker::JobHandle;
use crate::types::{ContextKind, JobStatus, JobUuid};

pub use crate::errors::JobtagError;
pub use crate::tracker::TaskProgress;
pub use crate::types::TaskSpec;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - remote context (fresh or resumed job uuid)
/// - scheduler backend
/// - the dispatcher / tracker for the chosen subcommand
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = load_and_validate(&args.config)?;
    let scheduler = scheduler::from_config(&cfg);

    match args.command {
        Command::Submit { job, restart, uuid } => {
            let job = load_job(&job)?;
            let context = build_context(&cfg, uuid);
            let dispatcher = Dispatcher::from_config(&cfg, Arc::clone(&context), scheduler);

            if !restart {
                context.upload(&job.task_dirs(), &job.forward_files)?;
            }
            let handle = dispatcher.submit(&job.tasks, restart).await?;
            println!("{}", handle.job_uuid());
        }

        Command::Status { uuid, job } => {
            let tasks = match job {
                Some(path) => load_job(&path)?.tasks,
                None => Vec::new(),
            };
            let dispatcher = Dispatcher::from_config(&cfg, build_context(&cfg, Some(uuid)), scheduler);
            let handle = dispatcher.attach(&tasks);
            let status = dispatcher.check_status(&handle).await;
            println!("{status}");
            print_progress(&handle);
        }

        Command::JobId { uuid } => {
            let dispatcher = Dispatcher::from_config(&cfg, build_context(&cfg, Some(uuid)), scheduler);
            let handle = dispatcher.attach(&[]);
            println!("{}", dispatcher.get_job_id(&handle)?);
        }

        Command::Wait {
            uuid,
            job,
            timeout_secs,
        } => {
            let job = job.map(|path| load_job(&path)).transpose()?;
            let tasks = job.as_ref().map(|j| j.tasks.clone()).unwrap_or_default();
            let context = build_context(&cfg, Some(uuid));
            let dispatcher = Dispatcher::from_config(&cfg, Arc::clone(&context), scheduler);
            let handle = dispatcher.attach(&tasks);

            let status = poll_until_done(
                &handle,
                cfg.tracker.poll_interval(),
                timeout_secs.map(Duration::from_secs),
            )
            .await;
            println!("{status}");

            match status {
                JobStatus::Finished => {
                    if let Some(job) = &job {
                        if !job.backward_files.is_empty() {
                            context.download(&job.task_dirs(), &job.backward_files)?;
                        }
                    }
                }
                JobStatus::FailedUnknown => {
                    print_progress(&handle);
                    bail!("job {} ended without completing; resubmit with --restart", handle.job_uuid());
                }
                other => bail!("timed out waiting for job {} (last status {other})", handle.job_uuid()),
            }
        }

        Command::Cancel { uuid } => {
            let dispatcher = Dispatcher::from_config(&cfg, build_context(&cfg, Some(uuid)), scheduler);
            dispatcher.attach(&[]).cancel().await?;
        }

        Command::Script { job, restart, uuid } => {
            let job = load_job(&job)?;
            let dispatcher = Dispatcher::from_config(&cfg, build_context(&cfg, uuid), scheduler);
            print!("{}", dispatcher.script(&job.tasks, restart));
        }
    }

    Ok(())
}

/// Build the context selected by `[context].kind`, for a new job when
/// `uuid` is `None`.
pub fn build_context(cfg: &ConfigFile, uuid: Option<JobUuid>) -> Arc<dyn RemoteContext> {
    let uuid = uuid.unwrap_or_else(JobUuid::generate);
    debug!(job_uuid = %uuid, kind = ?cfg.context.kind, "building remote context");
    match cfg.context.kind {
        ContextKind::Local => Arc::new(LocalContext::resume(
            cfg.context.local_root.clone(),
            cfg.context.remote_root.clone(),
            uuid,
        )),
        ContextKind::Lazy => Arc::new(LazyLocalContext::resume(cfg.context.local_root.clone(), uuid)),
    }
}

/// Poll `handle` every `interval` until it reaches a terminal status or
/// `timeout` elapses; returns the last status seen.
pub async fn poll_until_done(
    handle: &JobHandle,
    interval: Duration,
    timeout: Option<Duration>,
) -> JobStatus {
    let started = Instant::now();
    loop {
        let status = handle.check_status().await;
        if status.is_terminal() {
            info!(job_uuid = %handle.job_uuid(), %status, "job reached terminal status");
            return status;
        }
        if let Some(limit) = timeout {
            if started.elapsed() >= limit {
                return status;
            }
        }
        tokio::time::sleep(interval).await;
    }
}

fn print_progress(handle: &JobHandle) {
    for task in handle.progress() {
        println!(
            "  {}: {}/{} slots{}",
            task.dir,
            task.completed_slots.len(),
            task.total_slots,
            if task.finished { " (finished)" } else { "" }
        );
    }
}
