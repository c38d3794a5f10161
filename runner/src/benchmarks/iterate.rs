//! Iterative write/read benchmark across nodes.
//!
//! Every iteration each worker thread writes its files, waits at the sync barrier until all
//! threads of all nodes wrote theirs, then reads a random selection of the iteration's files.
//! With `shuffle.mode` the files of all nodes share one directory per iteration, otherwise each
//! task only reads back what it wrote itself.

use super::operators::{random_read_list, read_single_file, write_single_file};
use crate::{
    config::{ConfigErrors, TaskConfiguration},
    distributed::{util::thread_file_name, BarrierError, SyncBarrier},
    executors::{ThreadEnv, ThreadIdentity, WorkerThread},
    registry::TaskKind,
    storage::{join, SharedStorage, StorageError},
    task::{context::Reduction, Task, TaskContext, TaskEnv, TaskIdentity},
    throughput::PhaseMeter,
};
use std::time::Instant;
use tracing::{debug, error, info, warn};

pub const READ_THROUGHPUT: &str = "ReadThroughput";
pub const WRITE_THROUGHPUT: &str = "WriteThroughput";

pub const KIND: TaskKind = TaskKind {
    name: "iterate",
    supervised: true,
    task: IterateTask::load,
    context,
    thread: IterateThread::load,
};

fn context(identity: &TaskIdentity) -> TaskContext {
    TaskContext::new(identity)
        .with_reduction(READ_THROUGHPUT, Reduction::Sum)
        .with_reduction(WRITE_THROUGHPUT, Reduction::Sum)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterateParams {
    pub buffer_size: usize,
    pub file_length: u64,
    pub iterations: usize,
    pub read_files: usize,
    pub shuffle: bool,
    pub work_dir: String,
    pub write_files: usize,
}

impl IterateParams {
    pub fn load(conf: &TaskConfiguration) -> Result<Self, ConfigErrors> {
        let buffer_size = conf.get_count("buffer.size.bytes")? as usize;

        if buffer_size == 0 {
            return Err(ConfigErrors::MalformedProperty {
                key: "buffer.size.bytes".to_owned(),
                expected: "a positive integer",
            });
        }

        Ok(Self {
            buffer_size,
            file_length: conf.get_count("file.length.bytes")?,
            iterations: conf.get_count("iterations")? as usize,
            read_files: conf.get_count("read.files.per.thread")? as usize,
            shuffle: conf.get_bool("shuffle.mode")?,
            work_dir: conf.get_property("work.dir")?,
            write_files: conf.get_count("write.files.per.thread")? as usize,
        })
    }

    /// directory receiving the files of `task_id` in `iteration`
    pub fn data_dir(&self, task_id: u32, iteration: usize) -> String {
        if self.shuffle {
            join(&self.work_dir, &format!("data/{iteration}"))
        } else {
            join(&self.work_dir, &format!("data/{task_id}/{iteration}"))
        }
    }

    /// files a thread of `task_id` may read in `iteration`
    pub fn read_candidates(
        &self,
        storage: &SharedStorage,
        task_id: u32,
        iteration: usize,
    ) -> Result<Vec<String>, StorageError> {
        storage.list(&self.data_dir(task_id, iteration))
    }
}

#[derive(Debug)]
pub struct IterateTask {
    identity: TaskIdentity,
    params: IterateParams,
    storage: SharedStorage,
}

impl IterateTask {
    pub fn load(env: &TaskEnv) -> Result<Box<dyn Task>, ConfigErrors> {
        Ok(Box::new(Self {
            identity: env.identity.clone(),
            params: IterateParams::load(&env.conf)?,
            storage: env.storage.clone(),
        }))
    }
}

impl Task for IterateTask {
    fn setup_task(&mut self, _context: &mut TaskContext) -> bool {
        let mut ok = true;

        for directory in ["data", "sync"] {
            let path = join(&self.params.work_dir, directory);

            if let Err(error) = self.storage.mkdirs(&path) {
                error!(error = ?error, path = %path, "Failed to create work directory");
                ok = false;
            }
        }

        info!(
            task = %self.identity,
            iterations = self.params.iterations,
            shuffle = self.params.shuffle,
            "Prepared iterate benchmark"
        );

        ok
    }

    fn cleanup_task(&mut self, context: &mut TaskContext) -> bool {
        info!(
            task = %self.identity,
            read = ?context.totals.get(READ_THROUGHPUT),
            write = ?context.totals.get(WRITE_THROUGHPUT),
            "Iterate benchmark finished (MB/s)"
        );

        true
    }
}

#[derive(Debug)]
pub struct IterateThread {
    env: ThreadEnv,
    params: Option<IterateParams>,
    barrier: Option<SyncBarrier>,
    success: bool,
    read_throughput: f64,
    write_throughput: f64,
}

impl IterateThread {
    pub fn load(env: ThreadEnv) -> Result<Box<dyn WorkerThread>, ConfigErrors> {
        Ok(Box::new(Self {
            env,
            params: None,
            barrier: None,
            success: false,
            read_throughput: 0.0,
            write_throughput: 0.0,
        }))
    }

    fn file_name(&self, index: usize) -> String {
        format!(
            "{}-{index}",
            thread_file_name(self.env.identity.task_id, self.env.identity.index)
        )
    }

    /// write phase of one iteration, returns the bytes written
    fn write_files(&mut self, params: &IterateParams, data_dir: &str) -> u64 {
        let mut bytes = 0;

        for index in 0..params.write_files {
            let path = join(data_dir, &self.file_name(index));

            match write_single_file(
                self.env.storage.as_ref(),
                &path,
                params.file_length,
                params.buffer_size,
            ) {
                Ok(written) => bytes += written,
                Err(error) => {
                    error!(error = ?error, path = %path, "Failed to write file");
                    self.success = false;
                }
            }
        }

        bytes
    }

    /// read phase of one iteration, returns the bytes read
    fn read_files(&mut self, params: &IterateParams, iteration: usize) -> u64 {
        let candidates =
            match params.read_candidates(&self.env.storage, self.env.identity.task_id, iteration) {
                Ok(candidates) => candidates,
                Err(error) => {
                    error!(error = ?error, iteration, "Failed to list read candidates");
                    self.success = false;

                    return 0;
                }
            };

        let mut bytes = 0;
        for path in random_read_list(&mut rand::thread_rng(), params.read_files, &candidates) {
            match read_single_file(self.env.storage.as_ref(), &path, params.buffer_size) {
                Ok(read) => bytes += read,
                Err(error) => {
                    error!(error = ?error, path = %path, "Failed to read file");
                    self.success = false;
                }
            }
        }

        bytes
    }
}

impl WorkerThread for IterateThread {
    fn identity(&self) -> &ThreadIdentity {
        &self.env.identity
    }

    fn setup_thread(&mut self, conf: &TaskConfiguration) -> bool {
        let params = match IterateParams::load(conf) {
            Ok(params) => params,
            Err(error) => {
                error!(error = ?error, thread = %self.env.identity, "Invalid benchmark properties: {error}");

                return false;
            }
        };
        let barrier = SyncBarrier::new(
            self.env.storage.clone(),
            &params.work_dir,
            self.env.identity.task_id,
            self.env.identity.index,
            &self.env.barrier,
        );

        if let Err(error) = barrier.prepare(params.iterations) {
            error!(error = ?error, thread = %self.env.identity, "Failed to setup thread: {error}");

            return false;
        }

        self.params = Some(params);
        self.barrier = Some(barrier);
        self.success = false;
        self.read_throughput = 0.0;
        self.write_throughput = 0.0;

        true
    }

    fn run_thread(&mut self) {
        let (params, barrier) = match (self.params.clone(), self.barrier.clone()) {
            (Some(params), Some(barrier)) => (params, barrier),
            _ => {
                error!(thread = %self.env.identity, "Thread was run without being set up");
                self.success = false;

                return;
            }
        };

        let mut write = PhaseMeter::default();
        let mut read = PhaseMeter::default();
        self.success = true;

        for iteration in 0..params.iterations {
            let data_dir = params.data_dir(self.env.identity.task_id, iteration);

            let start = Instant::now();
            let bytes = self.write_files(&params, &data_dir);
            write.add(bytes, start.elapsed());

            match barrier.sync(iteration) {
                Ok(waited) => debug!(iteration, waited = ?waited, "Passed sync barrier"),
                Err(error @ BarrierError::CoordinationStall { .. }) => {
                    error!(error = ?error, thread = %self.env.identity, "Giving up: {error}");
                    self.success = false;

                    break;
                }
                Err(error) => {
                    error!(error = ?error, thread = %self.env.identity, "Error in sync barrier: {error}");
                    self.success = false;
                }
            }

            let start = Instant::now();
            let bytes = self.read_files(&params, iteration);
            read.add(bytes, start.elapsed());
        }

        self.read_throughput = read.throughput();
        self.write_throughput = write.throughput();
        debug!(
            thread = %self.env.identity,
            read = self.read_throughput,
            write = self.write_throughput,
            "Thread finished"
        );
    }

    fn cleanup_thread(&mut self, _conf: &TaskConfiguration) -> bool {
        if self.barrier.take().is_none() {
            warn!(thread = %self.env.identity, "Cleaning up a thread that was never set up");
        }

        true
    }

    fn success(&self) -> bool {
        self.success
    }

    fn metrics(&self) -> Vec<(&'static str, f64)> {
        vec![
            (READ_THROUGHPUT, self.read_throughput),
            (WRITE_THROUGHPUT, self.write_throughput),
        ]
    }
}
