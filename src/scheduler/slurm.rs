// src/scheduler/slurm.rs

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::{BoxFuture, Scheduler, SubmitToken};
use crate::config::Resources;
use crate::errors::{JobtagError, Result};
use crate::script::ScriptDialect;
use crate::types::QueueState;

/// `sbatch --parsable` prints `<jobid>[;<cluster>]`.
static PARSABLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+(?:_\d+)?)(?:;\S+)?$").expect("valid regex"));

/// Plain `sbatch` output, seen when site wrappers drop `--parsable`.
static SUBMITTED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Submitted batch job (\d+)").expect("valid regex"));

/// Slurm backend driven through its command line tools.
#[derive(Debug, Clone, Default)]
pub struct Slurm {
    submit_args: Vec<String>,
}

impl Slurm {
    pub fn new(submit_args: Vec<String>) -> Self {
        Self { submit_args }
    }
}

/// `#SBATCH` lines for `resources`.
pub fn directives(resources: &Resources) -> Vec<String> {
    let mut lines = vec![
        format!("#SBATCH --nodes={}", resources.nodes),
        format!("#SBATCH --ntasks-per-node={}", resources.ntasks_per_node),
    ];
    if let Some(cpus) = resources.cpus_per_task {
        lines.push(format!("#SBATCH --cpus-per-task={cpus}"));
    }
    if let Some(gpus) = resources.gpus_per_node {
        if gpus > 0 {
            lines.push(format!("#SBATCH --gres=gpu:{gpus}"));
        }
    }
    lines.push(format!("#SBATCH --time={}", resources.time_limit));
    if let Some(partition) = &resources.partition {
        lines.push(format!("#SBATCH --partition={partition}"));
    }
    if let Some(mem) = &resources.mem {
        lines.push(format!("#SBATCH --mem={mem}"));
    }
    if let Some(qos) = &resources.qos {
        lines.push(format!("#SBATCH --qos={qos}"));
    }
    if let Some(account) = &resources.account {
        lines.push(format!("#SBATCH --account={account}"));
    }
    if let Some(constraint) = &resources.constraint {
        lines.push(format!("#SBATCH --constraint={constraint}"));
    }
    for extra in &resources.extra_directives {
        lines.push(format!("#SBATCH {extra}"));
    }
    lines
}

/// Extract the job id from `sbatch` stdout.
pub fn parse_submit_output(stdout: &str) -> Option<String> {
    let trimmed = stdout.trim();
    if let Some(line) = trimmed.lines().next() {
        if let Some(caps) = PARSABLE_RE.captures(line.trim()) {
            return Some(caps[1].to_string());
        }
    }
    SUBMITTED_RE
        .captures(trimmed)
        .map(|caps| caps[1].to_string())
}

/// Map a `squeue -o %T` state to a queue state.
///
/// Unknown states return `None`: never guess "done" from output we do not
/// understand.
pub fn parse_squeue_state(state: &str) -> Option<QueueState> {
    match state.trim().to_ascii_uppercase().as_str() {
        "PENDING" | "CONFIGURING" | "REQUEUED" | "REQUEUE_HOLD" | "REQUEUE_FED"
        | "RESV_DEL_HOLD" | "SUSPENDED" | "STOPPED" => Some(QueueState::Queued),
        "RUNNING" | "COMPLETING" | "STAGE_OUT" | "RESIZING" | "SIGNALING" => {
            Some(QueueState::Running)
        }
        "COMPLETED" | "CANCELLED" | "FAILED" | "TIMEOUT" | "NODE_FAIL" | "PREEMPTED"
        | "BOOT_FAIL" | "DEADLINE" | "OUT_OF_MEMORY" | "SPECIAL_EXIT" | "REVOKED" => {
            Some(QueueState::Gone)
        }
        _ => None,
    }
}

impl Scheduler for Slurm {
    fn name(&self) -> &'static str {
        "slurm"
    }

    fn dialect(&self, resources: &Resources) -> ScriptDialect {
        ScriptDialect {
            shebang: "#!/bin/bash -l".to_string(),
            directives: directives(resources),
            job_id_expr: "$SLURM_JOB_ID".to_string(),
        }
    }

    fn submit<'a>(
        &'a self,
        work_dir: &'a Path,
        script_name: &'a str,
    ) -> BoxFuture<'a, Result<SubmitToken>> {
        Box::pin(async move {
            let mut sbatch = Command::new("sbatch");
            sbatch
                .arg("--parsable")
                .args(&self.submit_args)
                .arg(script_name)
                .current_dir(work_dir);

            debug!(?sbatch, "running sbatch");
            let out = sbatch.output().await.map_err(|e| {
                JobtagError::SubmissionRejected(format!("failed to run sbatch: {e}"))
            })?;

            let stdout = String::from_utf8_lossy(&out.stdout).to_string();
            if !out.status.success() {
                return Err(JobtagError::SubmissionRejected(format!(
                    "sbatch exited with {}: {}",
                    out.status,
                    String::from_utf8_lossy(&out.stderr).trim()
                )));
            }

            let job_id = parse_submit_output(&stdout).ok_or_else(|| {
                JobtagError::SubmissionRejected(format!(
                    "could not parse sbatch output {:?}",
                    stdout.trim()
                ))
            })?;

            info!(job_id = %job_id, script = script_name, "sbatch accepted job");
            Ok(SubmitToken {
                raw: stdout.trim().to_string(),
                job_id: Some(job_id),
            })
        })
    }

    fn query<'a>(&'a self, job_id: &'a str) -> BoxFuture<'a, Result<QueueState>> {
        Box::pin(async move {
            let out = Command::new("squeue")
                .args(["-h", "-o", "%T", "-j", job_id])
                .output()
                .await
                .map_err(|e| {
                    JobtagError::TransientQueryFailure(format!("failed to run squeue: {e}"))
                })?;

            let stderr = String::from_utf8_lossy(&out.stderr);
            if !out.status.success() {
                if stderr.contains("Invalid job id") {
                    return Ok(QueueState::Gone);
                }
                warn!(job_id, stderr = %stderr.trim(), "squeue failed");
                return Err(JobtagError::TransientQueryFailure(format!(
                    "squeue exited with {}: {}",
                    out.status,
                    stderr.trim()
                )));
            }

            let stdout = String::from_utf8_lossy(&out.stdout);
            let Some(line) = stdout.lines().map(str::trim).find(|l| !l.is_empty()) else {
                return Ok(QueueState::Gone);
            };

            parse_squeue_state(line).ok_or_else(|| {
                JobtagError::TransientQueryFailure(format!(
                    "unrecognised squeue state {line:?} for job {job_id}"
                ))
            })
        })
    }

    fn cancel<'a>(&'a self, job_id: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let out = Command::new("scancel")
                .arg(job_id)
                .output()
                .await
                .map_err(JobtagError::from)?;
            if !out.status.success() {
                return Err(JobtagError::Other(anyhow::anyhow!(
                    "scancel {} failed: {}",
                    job_id,
                    String::from_utf8_lossy(&out.stderr).trim()
                )));
            }
            info!(job_id, "scancel issued");
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_parsable_and_plain_sbatch_output() {
        assert_eq!(parse_submit_output("12345\n").as_deref(), Some("12345"));
        assert_eq!(parse_submit_output("12345;cluster1").as_deref(), Some("12345"));
        assert_eq!(
            parse_submit_output("Submitted batch job 777\n").as_deref(),
            Some("777")
        );
        assert_eq!(parse_submit_output("sbatch: error: oops"), None);
        assert_eq!(parse_submit_output(""), None);
    }

    #[test]
    fn squeue_states_map_to_queue_states() {
        assert_eq!(parse_squeue_state("PENDING"), Some(QueueState::Queued));
        assert_eq!(parse_squeue_state("running"), Some(QueueState::Running));
        assert_eq!(parse_squeue_state("COMPLETING"), Some(QueueState::Running));
        assert_eq!(parse_squeue_state("CANCELLED"), Some(QueueState::Gone));
        assert_eq!(parse_squeue_state("COMPLETED"), Some(QueueState::Gone));
        assert_eq!(parse_squeue_state("garbage"), None);
    }

    #[test]
    fn directives_follow_resources() {
        let resources = Resources {
            partition: Some("gpu".to_string()),
            cpus_per_task: Some(4),
            gpus_per_node: Some(2),
            extra_directives: vec!["--exclusive".to_string()],
            ..Resources::default()
        };
        let lines = directives(&resources);

        assert_eq!(lines[0], "#SBATCH --nodes=1");
        assert!(lines.contains(&"#SBATCH --cpus-per-task=4".to_string()));
        assert!(lines.contains(&"#SBATCH --gres=gpu:2".to_string()));
        assert!(lines.contains(&"#SBATCH --time=0:30:00".to_string()));
        assert!(lines.contains(&"#SBATCH --partition=gpu".to_string()));
        assert_eq!(lines.last().unwrap(), "#SBATCH --exclusive");
    }

    #[test]
    fn dialect_uses_slurm_job_id() {
        let dialect = Slurm::default().dialect(&Resources::default());
        assert_eq!(dialect.job_id_expr, "$SLURM_JOB_ID");
        assert!(dialect.shebang.starts_with("#!/bin/bash"));
    }
}
