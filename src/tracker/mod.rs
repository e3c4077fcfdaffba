// src/tracker/mod.rs

//! Job handle and status tracking.
//!
//! A [`JobHandle`] is a polling client: every [`check_status`](JobHandle::check_status)
//! performs at most one scheduler query and a couple of marker existence
//! checks, then reports the best currently known [`JobStatus`]. It never
//! cancels, never sleeps and never waits for a deadline; cadence and
//! timeouts belong to the caller.
//!
//! The classification itself lives in [`status`].

pub mod status;

use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::context::RemoteContext;
use crate::errors::{JobtagError, Result};
use crate::scheduler::{Scheduler, SubmitToken};
use crate::tags::TagLayout;
use crate::types::{JobStatus, JobUuid, TaskSpec};

pub use status::{classify, Observation, QueryOutcome};

/// Per-task completion as read from the markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskProgress {
    pub dir: String,
    /// Slots whose `tag_{i}_finished` marker exists.
    pub completed_slots: Vec<usize>,
    pub total_slots: usize,
    /// `tag_finished` exists.
    pub finished: bool,
}

#[derive(Debug)]
struct TrackerState {
    status: JobStatus,
    job_id: Option<String>,
    query_failures: u32,
}

/// Handle on one scheduler submission.
pub struct JobHandle {
    context: Arc<dyn RemoteContext>,
    scheduler: Arc<dyn Scheduler>,
    layout: TagLayout,
    tasks: Vec<TaskSpec>,
    token: Option<SubmitToken>,
    max_query_failures: u32,
    state: Mutex<TrackerState>,
}

impl fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobHandle")
            .field("job_uuid", self.layout.job_uuid())
            .field("scheduler", &self.scheduler.name())
            .field("token", &self.token)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl JobHandle {
    /// A handle that has not been handed to the scheduler yet.
    pub fn new(
        context: Arc<dyn RemoteContext>,
        scheduler: Arc<dyn Scheduler>,
        tasks: Vec<TaskSpec>,
        max_query_failures: u32,
    ) -> Self {
        let layout = TagLayout::new(context.job_uuid().clone());
        Self {
            context,
            scheduler,
            layout,
            tasks,
            token: None,
            max_query_failures,
            state: Mutex::new(TrackerState {
                status: JobStatus::Unsubmitted,
                job_id: None,
                query_failures: 0,
            }),
        }
    }

    /// A handle for a job submitted earlier, possibly by another process.
    ///
    /// Starts in `Submitted`; the job id is discovered from the job-id marker.
    pub fn attach(
        context: Arc<dyn RemoteContext>,
        scheduler: Arc<dyn Scheduler>,
        tasks: Vec<TaskSpec>,
        max_query_failures: u32,
    ) -> Self {
        let handle = Self::new(context, scheduler, tasks, max_query_failures);
        handle.lock_state().status = JobStatus::Submitted;
        handle
    }

    pub(crate) fn mark_submitted(&mut self, token: SubmitToken) {
        info!(
            job_uuid = %self.layout.job_uuid(),
            token = %token.raw,
            "job submitted"
        );
        self.token = Some(token);
        self.lock_state().status = JobStatus::Submitted;
    }

    pub fn job_uuid(&self) -> &JobUuid {
        self.layout.job_uuid()
    }

    pub fn layout(&self) -> &TagLayout {
        &self.layout
    }

    pub fn tasks(&self) -> &[TaskSpec] {
        &self.tasks
    }

    /// What the scheduler returned on acceptance, if this handle submitted.
    pub fn token(&self) -> Option<&SubmitToken> {
        self.token.as_ref()
    }

    /// Last status computed by [`check_status`](Self::check_status).
    pub fn last_status(&self) -> JobStatus {
        self.lock_state().status
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Scheduler job id as recorded by the running script.
    ///
    /// Fails with [`JobtagError::NotYetAvailable`] until the job-id marker
    /// exists. Once read, the id is cached for the life of the handle.
    pub fn get_job_id(&self) -> Result<String> {
        if let Some(id) = &self.lock_state().job_id {
            return Ok(id.clone());
        }

        let marker = self.layout.job_id_marker();
        if !self.context.exists(&marker) {
            return Err(JobtagError::NotYetAvailable(format!(
                "{marker} not written yet"
            )));
        }
        let id = match self.context.read_file(&marker) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                debug!(marker = %marker, error = %e, "job id marker not readable yet");
                return Err(JobtagError::NotYetAvailable(format!("{marker}: {e}")));
            }
        };
        if id.is_empty() {
            return Err(JobtagError::NotYetAvailable(format!("{marker} is empty")));
        }

        debug!(job_uuid = %self.layout.job_uuid(), job_id = %id, "job id discovered");
        self.lock_state().job_id = Some(id.clone());
        Ok(id)
    }

    /// One non-blocking poll.
    ///
    /// Scheduler query failures are absorbed until more than
    /// `max_query_failures` happen in a row, at which point the job is
    /// reported as `FailedUnknown`.
    pub async fn check_status(&self) -> JobStatus {
        let previous = self.last_status();
        if previous == JobStatus::Unsubmitted {
            return previous;
        }

        let job_marker = self.layout.job_marker();
        if self.context.exists(&job_marker) {
            return self.record(previous, JobStatus::Finished);
        }

        let marker_id = self.get_job_id().ok();
        let query_id = self
            .token
            .as_ref()
            .and_then(|t| t.job_id.clone())
            .or_else(|| marker_id.clone());

        let query = match &query_id {
            None => QueryOutcome::NotQueried,
            Some(id) => match self.scheduler.query(id).await {
                Ok(state) => {
                    self.lock_state().query_failures = 0;
                    QueryOutcome::State(state)
                }
                Err(e) => {
                    let failures = {
                        let mut state = self.lock_state();
                        state.query_failures += 1;
                        state.query_failures
                    };
                    warn!(
                        job_uuid = %self.layout.job_uuid(),
                        job_id = %id,
                        failures,
                        error = %e,
                        "scheduler query failed"
                    );
                    QueryOutcome::Failed(failures)
                }
            },
        };

        // Re-check after the query: a job that left the queue wrote its
        // marker before exiting.
        let observation = Observation {
            previous,
            job_marker: self.context.exists(&job_marker),
            job_id_marker: marker_id.is_some(),
            query,
            max_query_failures: self.max_query_failures,
        };
        let next = classify(&observation);
        self.record(previous, next)
    }

    fn record(&self, previous: JobStatus, next: JobStatus) -> JobStatus {
        self.lock_state().status = next;
        if previous != next {
            info!(
                job_uuid = %self.layout.job_uuid(),
                from = %previous,
                to = %next,
                "job status changed"
            );
        }
        next
    }

    /// Which slots of each task have completed, read from the markers.
    ///
    /// After a `FailedUnknown` this is the partial completion a restart
    /// will skip.
    pub fn progress(&self) -> Vec<TaskProgress> {
        self.tasks
            .iter()
            .map(|task| {
                let completed_slots = (0..task.commands.len())
                    .filter(|&slot| self.context.exists(&self.layout.slot_marker(&task.dir, slot)))
                    .collect();
                TaskProgress {
                    dir: task.dir.clone(),
                    completed_slots,
                    total_slots: task.commands.len(),
                    finished: self.context.exists(&self.layout.task_marker(&task.dir)),
                }
            })
            .collect()
    }

    /// Ask the scheduler to kill this job. Operator action; polling never
    /// calls it.
    pub async fn cancel(&self) -> Result<()> {
        let id = match self.token.as_ref().and_then(|t| t.job_id.clone()) {
            Some(id) => id,
            None => self.get_job_id()?,
        };
        warn!(job_uuid = %self.layout.job_uuid(), job_id = %id, "cancelling job");
        self.scheduler.cancel(&id).await
    }
}
