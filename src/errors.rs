// src/errors.rs

//! Crate-wide error type and result alias.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum JobtagError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// Upload/download failed. Surfaced to the caller, never retried here.
    #[error("Transfer error: {0}")]
    Transfer(String),

    /// The scheduler refused the job.
    #[error("Submission rejected: {0}")]
    SubmissionRejected(String),

    /// The job-id marker has not been written yet. Poll again.
    #[error("Job id not yet available: {0}")]
    NotYetAvailable(String),

    /// A scheduler status query failed in a way that may succeed on retry.
    #[error("Transient scheduler query failure: {0}")]
    TransientQueryFailure(String),

    /// A fresh submission was attempted for a job uuid that already has one.
    #[error("Job {0} was already submitted; resubmit with restart")]
    AlreadySubmitted(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl JobtagError {
    /// True for errors a polling caller should simply retry later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            JobtagError::NotYetAvailable(_) | JobtagError::TransientQueryFailure(_)
        )
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, JobtagError>;
