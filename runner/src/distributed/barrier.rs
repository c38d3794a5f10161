use super::util::thread_file_name;
use crate::{
    config::BarrierConfig,
    storage::{join, SharedStorage, StorageError},
};
use std::{
    thread,
    time::{Duration, Instant},
};
use thiserror::Error;
use tracing::{debug, trace, warn};

#[derive(Error, Debug)]
pub enum BarrierError {
    #[error("Barrier of iteration {iteration} stalled after {waited:?} with {remaining} participants missing")]
    CoordinationStall {
        iteration: usize,
        remaining: usize,
        waited: Duration,
    },
    #[error("Storage backend failed during barrier")]
    Storage(#[from] StorageError),
}

/// Storage-mediated rendezvous of all worker threads on all nodes
///
/// Every participant owns one token per iteration at `<work>/sync/<iteration>/<task>-<thread>`.
/// Arriving deletes the own token, the barrier is open once the iteration's directory is empty.
#[derive(Debug, Clone)]
pub struct SyncBarrier {
    storage: SharedStorage,
    sync_dir: String,
    token: String,
    poll_interval: Duration,
    timeout: Option<Duration>,
}

impl SyncBarrier {
    pub fn new(
        storage: SharedStorage,
        work_dir: &str,
        task_id: u32,
        thread_id: usize,
        config: &BarrierConfig,
    ) -> Self {
        Self {
            storage,
            sync_dir: join(work_dir, "sync"),
            token: thread_file_name(task_id, thread_id),
            poll_interval: config.poll_interval(),
            timeout: config.timeout(),
        }
    }

    pub fn iteration_dir(&self, iteration: usize) -> String {
        join(&self.sync_dir, &iteration.to_string())
    }

    pub fn token_path(&self, iteration: usize) -> String {
        join(&self.iteration_dir(iteration), &self.token)
    }

    /// create one token for each iteration, must happen on every node before any run starts
    pub fn prepare(&self, iterations: usize) -> Result<(), StorageError> {
        for iteration in 0..iterations {
            self.storage.create_empty(&self.token_path(iteration))?;
        }

        debug!(token = %self.token, iterations, "Prepared sync barrier");

        Ok(())
    }

    /// announce that this participant finished the iteration
    pub fn arrive(&self, iteration: usize) -> Result<(), StorageError> {
        let token = self.token_path(iteration);

        if !self.storage.delete(&token, false)? {
            warn!(token = %token, "Sync token was already gone");
        }

        Ok(())
    }

    /// Block until every participant arrived, returns the time spent waiting
    ///
    /// Without a configured timeout this never gives up, a participant that never arrives keeps
    /// everyone else waiting.
    pub fn wait(&self, iteration: usize) -> Result<Duration, BarrierError> {
        let directory = self.iteration_dir(iteration);
        let start = Instant::now();
        let mut polls: u64 = 0;

        loop {
            let remaining = self.storage.list(&directory)?.len();

            if remaining == 0 {
                let waited = start.elapsed();
                trace!(iteration, polls, waited = ?waited, "Sync barrier open");

                return Ok(waited);
            }

            let waited = start.elapsed();
            if let Some(timeout) = self.timeout {
                if waited >= timeout {
                    return Err(BarrierError::CoordinationStall {
                        iteration,
                        remaining,
                        waited,
                    });
                }
            }

            polls += 1;
            if polls % 100 == 0 {
                debug!(iteration, remaining, waited = ?waited, "Still waiting at sync barrier");
            }

            thread::sleep(self.poll_interval);
        }
    }

    /// arrive and wait
    pub fn sync(&self, iteration: usize) -> Result<Duration, BarrierError> {
        self.arrive(iteration)?;
        self.wait(iteration)
    }
}
