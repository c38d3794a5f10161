//! Metadata benchmark: create, stat and delete small files as fast as possible.

use crate::{
    config::{ConfigErrors, TaskConfiguration},
    distributed::util::thread_file_name,
    executors::{ThreadEnv, ThreadIdentity, WorkerThread},
    registry::TaskKind,
    storage::{join, SharedStorage},
    task::{context::Reduction, Task, TaskContext, TaskEnv, TaskIdentity},
    throughput::operations_per_second,
};
use std::time::Instant;
use tracing::{error, info, warn};

pub const METADATA_OPS: &str = "MetadataOps";

pub const KIND: TaskKind = TaskKind {
    name: "metadata",
    supervised: false,
    task: MetadataTask::load,
    context,
    thread: MetadataThread::load,
};

fn context(identity: &TaskIdentity) -> TaskContext {
    TaskContext::new(identity).with_reduction(METADATA_OPS, Reduction::Sum)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataParams {
    pub operations: u64,
    pub work_dir: String,
}

impl MetadataParams {
    pub fn load(conf: &TaskConfiguration) -> Result<Self, ConfigErrors> {
        Ok(Self {
            operations: conf.get_count("ops.per.thread")?,
            work_dir: conf.get_property("work.dir")?,
        })
    }
}

#[derive(Debug)]
pub struct MetadataTask {
    params: MetadataParams,
    storage: SharedStorage,
}

impl MetadataTask {
    pub fn load(env: &TaskEnv) -> Result<Box<dyn Task>, ConfigErrors> {
        Ok(Box::new(Self {
            params: MetadataParams::load(&env.conf)?,
            storage: env.storage.clone(),
        }))
    }
}

impl Task for MetadataTask {
    fn setup_task(&mut self, _context: &mut TaskContext) -> bool {
        let path = join(&self.params.work_dir, "metadata");

        match self.storage.mkdirs(&path) {
            Ok(()) => true,
            Err(error) => {
                error!(error = ?error, path = %path, "Failed to create work directory");

                false
            }
        }
    }

    fn cleanup_task(&mut self, context: &mut TaskContext) -> bool {
        info!(ops = ?context.totals.get(METADATA_OPS), "Metadata benchmark finished (ops/s)");

        true
    }
}

/// every round completes exactly three operations
fn all_rounds_completed(operations: u64, rounds: u64) -> bool {
    rounds.checked_mul(3) == Some(operations)
}

#[derive(Debug)]
pub struct MetadataThread {
    env: ThreadEnv,
    params: Option<MetadataParams>,
    success: bool,
    ops_per_second: f64,
}

impl MetadataThread {
    pub fn load(env: ThreadEnv) -> Result<Box<dyn WorkerThread>, ConfigErrors> {
        Ok(Box::new(Self {
            env,
            params: None,
            success: false,
            ops_per_second: 0.0,
        }))
    }

    fn directory(&self, params: &MetadataParams) -> String {
        join(
            &params.work_dir,
            &format!(
                "metadata/{}",
                thread_file_name(self.env.identity.task_id, self.env.identity.index)
            ),
        )
    }

    /// one create -> exists -> delete round, returns the completed operations
    fn round(&self, path: &str) -> u64 {
        let storage = &self.env.storage;

        if let Err(error) = storage.create_empty(path) {
            error!(error = ?error, path = path, "Failed to create file");
            return 0;
        }

        match storage.exists(path) {
            Ok(true) => {}
            Ok(false) => {
                error!(path = path, "Created file is not visible");
                return 1;
            }
            Err(error) => {
                error!(error = ?error, path = path, "Failed to check file");
                return 1;
            }
        }

        match storage.delete(path, false) {
            Ok(true) => 3,
            Ok(false) => {
                error!(path = path, "Created file vanished before delete");
                2
            }
            Err(error) => {
                error!(error = ?error, path = path, "Failed to delete file");
                2
            }
        }
    }
}

impl WorkerThread for MetadataThread {
    fn identity(&self) -> &ThreadIdentity {
        &self.env.identity
    }

    fn setup_thread(&mut self, conf: &TaskConfiguration) -> bool {
        let params = match MetadataParams::load(conf) {
            Ok(params) => params,
            Err(error) => {
                error!(error = ?error, thread = %self.env.identity, "Invalid benchmark properties: {error}");

                return false;
            }
        };

        if let Err(error) = self.env.storage.mkdirs(&self.directory(&params)) {
            error!(error = ?error, thread = %self.env.identity, "Failed to setup thread: {error}");

            return false;
        }

        self.params = Some(params);
        self.success = false;
        self.ops_per_second = 0.0;

        true
    }

    fn run_thread(&mut self) {
        let Some(params) = self.params.clone() else {
            error!(thread = %self.env.identity, "Thread was run without being set up");
            self.success = false;

            return;
        };

        let directory = self.directory(&params);
        let mut operations = 0;
        let start = Instant::now();

        for index in 0..params.operations {
            operations += self.round(&join(&directory, &index.to_string()));
        }

        self.ops_per_second = operations_per_second(operations, start.elapsed());
        self.success = all_rounds_completed(operations, params.operations);
    }

    fn cleanup_thread(&mut self, _conf: &TaskConfiguration) -> bool {
        let Some(params) = self.params.as_ref() else {
            return true;
        };

        match self.env.storage.delete(&self.directory(params), true) {
            Ok(_) => true,
            Err(error) => {
                warn!(error = ?error, thread = %self.env.identity, "Error when removing thread directory");

                false
            }
        }
    }

    fn success(&self) -> bool {
        self.success
    }

    fn metrics(&self) -> Vec<(&'static str, f64)> {
        vec![(METADATA_OPS, self.ops_per_second)]
    }
}
