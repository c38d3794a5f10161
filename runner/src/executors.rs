pub mod local;

use crate::{config::BarrierConfig, config::TaskConfiguration, storage::SharedStorage};
use std::fmt::{Debug, Display};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("Failed to spawn worker thread")]
    Spawn(#[from] std::io::Error),
    #[error("Worker thread {0} panicked")]
    Panicked(String),
}

/// identifies one worker thread of one task on one node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadIdentity {
    pub index: usize,
    pub task_id: u32,
    pub node: String,
    pub task_type: String,
}

impl Display for ThreadIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}-{}@{} thread {}",
            self.task_type, self.task_id, self.node, self.index
        )
    }
}

/// Everything a worker thread gets handed at construction
#[derive(Debug, Clone)]
pub struct ThreadEnv {
    pub identity: ThreadIdentity,
    pub storage: SharedStorage,
    pub barrier: BarrierConfig,
}

/// One slice of a benchmark workload, run on its own OS thread
///
/// Failures are never returned from `run_thread`, they are recorded and read through
/// `success` once the thread terminated. Siblings only ever share the storage backend.
pub trait WorkerThread: Debug + Send {
    fn identity(&self) -> &ThreadIdentity;

    fn setup_thread(&mut self, conf: &TaskConfiguration) -> bool;

    fn run_thread(&mut self);

    fn cleanup_thread(&mut self, conf: &TaskConfiguration) -> bool;

    fn success(&self) -> bool;

    /// metric name -> value of this thread
    fn metrics(&self) -> Vec<(&'static str, f64)>;
}
