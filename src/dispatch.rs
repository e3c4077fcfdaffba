// src/dispatch.rs

//! Submit / restart orchestration.
//!
//! [`Dispatcher`] is the entry point a workflow driver uses: it turns task
//! directories and their command lists into a batch script, writes it to the
//! remote root, hands it to the scheduler and returns a [`JobHandle`] for
//! polling.
//!
//! A restart resubmits under the same job uuid. Which slots to skip is not
//! decided here: the generated script checks each slot's marker on the
//! execution side, where the authoritative tag state lives.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::{validate_tasks, ConfigFile, Resources};
use crate::context::RemoteContext;
use crate::errors::{JobtagError, Result};
use crate::scheduler::Scheduler;
use crate::script::{self, ScriptOptions};
use crate::tags::TagLayout;
use crate::tracker::JobHandle;
use crate::types::{JobStatus, TaskSpec};

const DEFAULT_MAX_QUERY_FAILURES: u32 = 3;

#[derive(Debug, Clone)]
pub struct Dispatcher {
    context: Arc<dyn RemoteContext>,
    scheduler: Arc<dyn Scheduler>,
    resources: Resources,
    options: ScriptOptions,
    max_query_failures: u32,
}

impl Dispatcher {
    pub fn new(context: Arc<dyn RemoteContext>, scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            context,
            scheduler,
            resources: Resources::default(),
            options: ScriptOptions::default(),
            max_query_failures: DEFAULT_MAX_QUERY_FAILURES,
        }
    }

    pub fn from_config(
        cfg: &ConfigFile,
        context: Arc<dyn RemoteContext>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        Self::new(context, scheduler)
            .with_resources(cfg.resources.clone())
            .with_script_options(cfg.script_options())
            .with_max_query_failures(cfg.tracker.max_query_failures)
    }

    pub fn with_resources(mut self, resources: Resources) -> Self {
        self.resources = resources;
        self
    }

    pub fn with_script_options(mut self, options: ScriptOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_max_query_failures(mut self, max: u32) -> Self {
        self.max_query_failures = max;
        self
    }

    pub fn context(&self) -> &Arc<dyn RemoteContext> {
        &self.context
    }

    pub fn layout(&self) -> TagLayout {
        TagLayout::new(self.context.job_uuid().clone())
    }

    /// The batch script [`submit`](Self::submit) would write.
    pub fn script(&self, tasks: &[TaskSpec], restart: bool) -> String {
        let dialect = self.scheduler.dialect(&self.resources);
        script::generate(&dialect, &self.layout(), tasks, &self.options, restart)
    }

    /// Submit `tasks` as one scheduler job.
    ///
    /// A fresh submission (`restart == false`) fails with
    /// [`JobtagError::AlreadySubmitted`] if this job uuid already has a
    /// script or job-id marker, and otherwise clears any task markers an
    /// earlier job left in the task directories. A restart reuses the uuid so existing slot
    /// markers are honoured, and clears the previous run's job-id marker so
    /// it cannot be mistaken for the new one.
    pub async fn submit(&self, tasks: &[TaskSpec], restart: bool) -> Result<JobHandle> {
        validate_tasks(tasks)?;
        let layout = self.layout();
        let job_uuid = layout.job_uuid().clone();

        for task in tasks {
            if !self.context.dir_exists(&task.dir) {
                return Err(JobtagError::Transfer(format!(
                    "task directory {:?} is missing under remote root {:?}",
                    task.dir,
                    self.context.remote_root()
                )));
            }
        }

        let script_name = layout.script_name();
        let id_marker = layout.job_id_marker();
        if restart {
            if self.context.exists(&id_marker) {
                debug!(job_uuid = %job_uuid, marker = %id_marker, "removing previous job id marker");
                self.context.remove_file(&id_marker)?;
            }
        } else if self.context.exists(&script_name) || self.context.exists(&id_marker) {
            return Err(JobtagError::AlreadySubmitted(job_uuid.to_string()));
        } else {
            self.clear_task_markers(&layout, tasks)?;
        }

        let script = self.script(tasks, restart);
        self.context.write_file(&script_name, &script)?;

        let mut handle = JobHandle::new(
            Arc::clone(&self.context),
            Arc::clone(&self.scheduler),
            tasks.to_vec(),
            self.max_query_failures,
        );

        let token = self
            .scheduler
            .submit(self.context.remote_root(), &script_name)
            .await;
        let token = match token {
            Ok(token) => token,
            Err(e) => {
                warn!(job_uuid = %job_uuid, error = %e, "scheduler rejected job");
                // Nothing was queued, so the uuid stays free for a fresh submit.
                if let Err(cleanup) = self.context.remove_file(&script_name) {
                    debug!(job_uuid = %job_uuid, error = %cleanup, "could not remove rejected script");
                }
                return Err(e);
            }
        };

        info!(
            job_uuid = %job_uuid,
            scheduler = self.scheduler.name(),
            tasks = tasks.len(),
            restart,
            "dispatched job"
        );
        handle.mark_submitted(token);
        Ok(handle)
    }

    /// Remove task markers left in the task directories by an earlier job.
    ///
    /// Task markers are not namespaced by job uuid, so a fresh submission
    /// must start from none: the script's final check would otherwise count
    /// a stale `tag_finished` as this run's success.
    fn clear_task_markers(&self, layout: &TagLayout, tasks: &[TaskSpec]) -> Result<()> {
        for task in tasks {
            let stale = (0..task.commands.len())
                .map(|slot| layout.slot_marker(&task.dir, slot))
                .chain(std::iter::once(layout.task_marker(&task.dir)));
            for marker in stale {
                if self.context.exists(&marker) {
                    debug!(job_uuid = %layout.job_uuid(), marker = %marker, "removing stale task marker");
                    self.context.remove_file(&marker)?;
                }
            }
        }
        Ok(())
    }

    /// Handle for this context's job without submitting anything.
    pub fn attach(&self, tasks: &[TaskSpec]) -> JobHandle {
        JobHandle::attach(
            Arc::clone(&self.context),
            Arc::clone(&self.scheduler),
            tasks.to_vec(),
            self.max_query_failures,
        )
    }

    pub async fn check_status(&self, handle: &JobHandle) -> JobStatus {
        handle.check_status().await
    }

    pub fn get_job_id(&self, handle: &JobHandle) -> Result<String> {
        handle.get_job_id()
    }
}
