// src/tracker/status.rs

//! Pure status classification.
//!
//! [`classify`] turns one poll's observations into a [`JobStatus`]. It has
//! no IO so the whole state machine can be tested without a scheduler or a
//! filesystem; [`JobHandle`](super::JobHandle) gathers the observations.

use crate::types::{JobStatus, QueueState};

/// Result of asking the scheduler about the job during one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOutcome {
    /// No job id known yet, so nothing was asked.
    NotQueried,
    State(QueueState),
    /// The query failed; the value is the consecutive failure count
    /// including this one.
    Failed(u32),
}

/// Everything one poll learned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    pub previous: JobStatus,
    /// `{job_uuid}_tag_finished` exists.
    pub job_marker: bool,
    /// `{job_uuid}_job_id` has been read, i.e. the script started executing.
    pub job_id_marker: bool,
    pub query: QueryOutcome,
    /// Consecutive query failures tolerated before giving up.
    pub max_query_failures: u32,
}

/// Map one poll to a status.
///
/// The whole-job marker is authoritative: without it a job is never
/// `Finished`, whatever the scheduler says, and with it the job is always
/// `Finished`. `FailedUnknown` is only ever left for `Finished`.
pub fn classify(obs: &Observation) -> JobStatus {
    if obs.previous == JobStatus::Unsubmitted {
        return JobStatus::Unsubmitted;
    }
    if obs.job_marker {
        return JobStatus::Finished;
    }
    if obs.previous == JobStatus::FailedUnknown {
        return JobStatus::FailedUnknown;
    }

    match obs.query {
        QueryOutcome::NotQueried => {
            if obs.job_id_marker {
                JobStatus::Running
            } else {
                JobStatus::Submitted
            }
        }
        QueryOutcome::State(QueueState::Queued) => {
            if obs.job_id_marker {
                JobStatus::Running
            } else {
                JobStatus::Submitted
            }
        }
        QueryOutcome::State(QueueState::Running) => JobStatus::Running,
        QueryOutcome::State(QueueState::Gone) => JobStatus::FailedUnknown,
        QueryOutcome::Failed(count) if count > obs.max_query_failures => JobStatus::FailedUnknown,
        QueryOutcome::Failed(_) => match obs.previous {
            JobStatus::Submitted if obs.job_id_marker => JobStatus::Running,
            other => other,
        },
    }
}
