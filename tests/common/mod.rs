#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use jobtag::context::{LocalContext, RemoteContext};
use jobtag::dispatch::Dispatcher;
use jobtag::fs::mock::MockFileSystem;
use jobtag::types::{JobUuid, TaskSpec};

pub use jobtag_test_utils::execution::ExecutionSim;
pub use jobtag_test_utils::fake_scheduler::{FakeAnswer, FakeScheduler};
pub use jobtag_test_utils::{init_tracing, with_timeout};

pub const LOCAL: &str = "loc";
pub const REMOTE: &str = "rmt";

/// Everything a mock-backed lifecycle test needs.
pub struct MockJob {
    pub fs: MockFileSystem,
    pub context: Arc<dyn RemoteContext>,
    pub scheduler: FakeScheduler,
    pub dispatcher: Dispatcher,
}

impl MockJob {
    /// Remote task dirs exist; nothing has been submitted.
    pub fn new(uuid: &str, tasks: &[TaskSpec]) -> Self {
        let fs = MockFileSystem::new();
        for task in tasks {
            fs.add_dir(Path::new(REMOTE).join(&task.dir));
        }
        Self::with_fs(fs, uuid)
    }

    /// Same remote filesystem, new context and dispatcher for the same uuid.
    pub fn with_fs(fs: MockFileSystem, uuid: &str) -> Self {
        let uuid: JobUuid = uuid.parse().expect("valid uuid");
        let context: Arc<dyn RemoteContext> =
            Arc::new(LocalContext::with_fs(fs.clone(), LOCAL, REMOTE, uuid));
        let scheduler = FakeScheduler::new();
        let dispatcher = Dispatcher::new(Arc::clone(&context), Arc::new(scheduler.clone()));
        Self {
            fs,
            context,
            scheduler,
            dispatcher,
        }
    }

    pub fn sim(&self) -> ExecutionSim {
        ExecutionSim::new(self.fs.clone(), REMOTE, self.dispatcher.layout())
    }

    pub fn remote_exists(&self, rel: &str) -> bool {
        self.context.exists(rel)
    }
}
