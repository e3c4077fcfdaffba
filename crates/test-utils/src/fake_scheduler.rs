use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use jobtag::config::Resources;
use jobtag::errors::{JobtagError, Result};
use jobtag::scheduler::{BoxFuture, Scheduler, SubmitToken};
use jobtag::script::ScriptDialect;
use jobtag::types::QueueState;

/// Scripted answer to a `query`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeAnswer {
    State(QueueState),
    Fail,
}

#[derive(Debug)]
struct FakeState {
    next_id: u32,
    reject_next: Option<String>,
    submissions: Vec<(PathBuf, String)>,
    answers: HashMap<String, VecDeque<FakeAnswer>>,
    default_answer: FakeAnswer,
    queries: Vec<String>,
    cancelled: Vec<String>,
}

/// A fake scheduler that:
/// - hands out job ids `1000`, `1001`, ...
/// - records every submission and query
/// - answers queries from a per-job script, falling back to a default.
#[derive(Debug, Clone)]
pub struct FakeScheduler {
    state: Arc<Mutex<FakeState>>,
}

impl FakeScheduler {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeState {
                next_id: 1000,
                reject_next: None,
                submissions: Vec::new(),
                answers: HashMap::new(),
                default_answer: FakeAnswer::State(QueueState::Queued),
                queries: Vec::new(),
                cancelled: Vec::new(),
            })),
        }
    }

    pub fn push_answers(&self, job_id: &str, answers: &[FakeAnswer]) {
        let mut state = self.state.lock().unwrap();
        state
            .answers
            .entry(job_id.to_string())
            .or_default()
            .extend(answers.iter().copied());
    }

    pub fn set_default(&self, answer: FakeAnswer) {
        self.state.lock().unwrap().default_answer = answer;
    }

    pub fn reject_next(&self, reason: &str) {
        self.state.lock().unwrap().reject_next = Some(reason.to_string());
    }

    pub fn submissions(&self) -> Vec<(PathBuf, String)> {
        self.state.lock().unwrap().submissions.clone()
    }

    pub fn queries(&self) -> Vec<String> {
        self.state.lock().unwrap().queries.clone()
    }

    pub fn cancelled(&self) -> Vec<String> {
        self.state.lock().unwrap().cancelled.clone()
    }
}

impl Default for FakeScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for FakeScheduler {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn dialect(&self, _resources: &Resources) -> ScriptDialect {
        ScriptDialect {
            shebang: "#!/bin/bash".to_string(),
            directives: vec!["#FAKE --queue=test".to_string()],
            job_id_expr: "$FAKE_JOB_ID".to_string(),
        }
    }

    fn submit<'a>(
        &'a self,
        work_dir: &'a Path,
        script_name: &'a str,
    ) -> BoxFuture<'a, Result<SubmitToken>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            if let Some(reason) = state.reject_next.take() {
                return Err(JobtagError::SubmissionRejected(reason));
            }
            let id = state.next_id.to_string();
            state.next_id += 1;
            state
                .submissions
                .push((work_dir.to_path_buf(), script_name.to_string()));
            Ok(SubmitToken {
                raw: format!("Submitted batch job {id}"),
                job_id: Some(id),
            })
        })
    }

    fn query<'a>(&'a self, job_id: &'a str) -> BoxFuture<'a, Result<QueueState>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            state.queries.push(job_id.to_string());
            let default_answer = state.default_answer;
            let answer = state
                .answers
                .get_mut(job_id)
                .and_then(|q| q.pop_front())
                .unwrap_or(default_answer);
            match answer {
                FakeAnswer::State(s) => Ok(s),
                FakeAnswer::Fail => Err(JobtagError::TransientQueryFailure(format!(
                    "scripted failure for {job_id}"
                ))),
            }
        })
    }

    fn cancel<'a>(&'a self, job_id: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            state.cancelled.push(job_id.to_string());
            state
                .answers
                .insert(job_id.to_string(), VecDeque::from([FakeAnswer::State(QueueState::Gone)]));
            Ok(())
        })
    }
}
