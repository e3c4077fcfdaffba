// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::types::JobUuid;

/// Command-line arguments for `jobtag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "jobtag",
    version,
    about = "Submit, track and restart batch jobs using completion tags on a shared filesystem.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Jobtag.toml` in the current working directory. A missing
    /// default file means "use all defaults".
    #[arg(long, value_name = "PATH", default_value = "Jobtag.toml", global = true)]
    pub config: PathBuf,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `JOBTAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Upload forward files and submit the job. Prints the job uuid.
    Submit {
        /// Job description (TOML).
        #[arg(long, value_name = "PATH")]
        job: PathBuf,

        /// Resubmit an existing job, skipping slots already marked finished.
        #[arg(long, requires = "uuid")]
        restart: bool,

        /// Job uuid to restart.
        #[arg(long, value_name = "UUID")]
        uuid: Option<JobUuid>,
    },

    /// Poll a job once and print its status.
    Status {
        #[arg(long, value_name = "UUID")]
        uuid: JobUuid,

        /// Job description, to also print per-task progress.
        #[arg(long, value_name = "PATH")]
        job: Option<PathBuf>,
    },

    /// Print the scheduler job id recorded by the running job.
    JobId {
        #[arg(long, value_name = "UUID")]
        uuid: JobUuid,
    },

    /// Poll until the job finishes or fails, then download backward files.
    Wait {
        #[arg(long, value_name = "UUID")]
        uuid: JobUuid,

        /// Job description; its `backward_files` are downloaded on success.
        #[arg(long, value_name = "PATH")]
        job: Option<PathBuf>,

        /// Give up after this many seconds.
        #[arg(long, value_name = "SECS")]
        timeout_secs: Option<u64>,
    },

    /// Ask the scheduler to kill the job.
    Cancel {
        #[arg(long, value_name = "UUID")]
        uuid: JobUuid,
    },

    /// Print the generated batch script without submitting.
    Script {
        #[arg(long, value_name = "PATH")]
        job: PathBuf,

        #[arg(long)]
        restart: bool,

        #[arg(long, value_name = "UUID")]
        uuid: Option<JobUuid>,
    },
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
