// src/scheduler/shell.rs

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, Mutex};

use tokio::process::{Child, Command};
use tracing::{debug, info};

use super::{BoxFuture, Scheduler, SubmitToken};
use crate::config::Resources;
use crate::errors::{JobtagError, Result};
use crate::script::ScriptDialect;
use crate::types::QueueState;

/// Runs the batch script as a detached local `bash` process.
///
/// The job id is the pid of that process, which also leads its own process
/// group so cancellation reaches every task subshell. Children spawned by
/// this instance are reaped on query; pids from other processes are probed
/// with `kill -0`.
#[derive(Debug, Clone, Default)]
pub struct Shell {
    children: Arc<Mutex<HashMap<String, Child>>>,
}

impl Shell {
    pub fn new() -> Self {
        Self::default()
    }

    /// `Some` if this instance spawned `job_id`.
    fn poll_own_child(&self, job_id: &str) -> Option<Result<QueueState>> {
        let mut children = self.children.lock().unwrap_or_else(|p| p.into_inner());
        let child = children.get_mut(job_id)?;
        let state = match child.try_wait() {
            Ok(Some(status)) => {
                debug!(job_id, %status, "shell job exited");
                children.remove(job_id);
                Ok(QueueState::Gone)
            }
            Ok(None) => Ok(QueueState::Running),
            Err(e) => Err(JobtagError::TransientQueryFailure(format!(
                "waiting on shell job {job_id}: {e}"
            ))),
        };
        Some(state)
    }
}

impl Scheduler for Shell {
    fn name(&self) -> &'static str {
        "shell"
    }

    fn dialect(&self, _resources: &Resources) -> ScriptDialect {
        ScriptDialect {
            shebang: "#!/bin/bash".to_string(),
            directives: Vec::new(),
            job_id_expr: "$$".to_string(),
        }
    }

    fn submit<'a>(
        &'a self,
        work_dir: &'a Path,
        script_name: &'a str,
    ) -> BoxFuture<'a, Result<SubmitToken>> {
        Box::pin(async move {
            let log_path = work_dir.join(format!("{script_name}.out"));
            let log = File::create(&log_path).map_err(|e| {
                JobtagError::SubmissionRejected(format!("creating {log_path:?}: {e}"))
            })?;
            let log_err = log.try_clone()?;

            let mut cmd = Command::new("bash");
            cmd.arg(script_name)
                .current_dir(work_dir)
                .stdin(Stdio::null())
                .stdout(Stdio::from(log))
                .stderr(Stdio::from(log_err));
            #[cfg(unix)]
            cmd.process_group(0);

            let child = cmd.spawn().map_err(|e| {
                JobtagError::SubmissionRejected(format!("spawning bash {script_name}: {e}"))
            })?;
            let pid = child
                .id()
                .ok_or_else(|| {
                    JobtagError::SubmissionRejected("shell job exited before it got a pid".into())
                })?
                .to_string();

            self.children.lock().unwrap_or_else(|p| p.into_inner()).insert(pid.clone(), child);
            info!(job_id = %pid, script = script_name, "started shell job");
            Ok(SubmitToken {
                raw: pid.clone(),
                job_id: Some(pid),
            })
        })
    }

    fn query<'a>(&'a self, job_id: &'a str) -> BoxFuture<'a, Result<QueueState>> {
        Box::pin(async move {
            if let Some(state) = self.poll_own_child(job_id) {
                return state;
            }

            let status = Command::new("kill")
                .args(["-0", job_id])
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await
                .map_err(|e| {
                    JobtagError::TransientQueryFailure(format!("probing pid {job_id}: {e}"))
                })?;
            Ok(if status.success() {
                QueueState::Running
            } else {
                QueueState::Gone
            })
        })
    }

    fn cancel<'a>(&'a self, job_id: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let group = format!("-{job_id}");
            let status = Command::new("kill")
                .args(["-TERM", "--", &group])
                .status()
                .await?;
            if !status.success() {
                return Err(JobtagError::Other(anyhow::anyhow!(
                    "kill -TERM -- {} exited with {}",
                    group,
                    status
                )));
            }
            info!(job_id, "terminated shell job process group");
            Ok(())
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn wait_until_gone(shell: &Shell, id: &str) -> bool {
        for _ in 0..100 {
            if shell.query(id).await.unwrap() == QueueState::Gone {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        false
    }

    #[tokio::test]
    async fn submitted_script_runs_in_work_dir_and_is_reaped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("job.sub"), "#!/bin/bash\nprintf '%s' \"$$\" > pid\n").unwrap();

        let shell = Shell::new();
        let token = shell.submit(dir.path(), "job.sub").await.unwrap();
        let id = token.job_id.unwrap();

        assert!(wait_until_gone(&shell, &id).await);
        let written = std::fs::read_to_string(dir.path().join("pid")).unwrap();
        assert_eq!(written, id);
    }

    #[tokio::test]
    async fn cancel_kills_the_whole_group() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("job.sub"),
            "#!/bin/bash\n( sleep 30; touch late ) &\nwait\n",
        )
        .unwrap();

        let shell = Shell::new();
        let id = shell.submit(dir.path(), "job.sub").await.unwrap().job_id.unwrap();
        assert_eq!(shell.query(&id).await.unwrap(), QueueState::Running);

        shell.cancel(&id).await.unwrap();
        assert!(wait_until_gone(&shell, &id).await);
        assert!(!dir.path().join("late").exists());
    }
}
