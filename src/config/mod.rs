// src/config/mod.rs

//! Configuration loading and validation for jobtag.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`) for both the runtime
//!   config (`Jobtag.toml`) and job description files.
//! - Load them from disk (`loader.rs`).
//! - Validate basic invariants (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, load_job, load_job_file};
pub use model::{
    ConfigFile, ContextSection, JobFile, RawConfigFile, RawJobFile, Resources, SchedulerSection,
    ScriptSection, TrackerSection,
};
pub use validate::{validate_config, validate_tasks};
