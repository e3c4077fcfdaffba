// src/script/dialect.rs

/// Scheduler-specific parts of a batch script.
///
/// Produced by [`Scheduler::dialect`](crate::scheduler::Scheduler::dialect);
/// the generator itself knows nothing about any particular scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptDialect {
    /// First line of the script.
    pub shebang: String,
    /// Directive lines placed right after the shebang (e.g. `#SBATCH ...`).
    pub directives: Vec<String>,
    /// Shell expression expanding to the scheduler's job id at run time.
    pub job_id_expr: String,
}
