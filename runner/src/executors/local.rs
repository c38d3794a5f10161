use super::{ExecutorError, WorkerThread};
use itertools::Itertools;
use std::thread;
use tracing::{debug, error, instrument, warn};

/// Run every worker on a dedicated OS thread and join all of them
///
/// All threads are started before the first join, a panicking or unspawnable worker is
/// reported in its slot without affecting the others. Returns one result per worker, in order.
#[instrument(skip(workers), fields(workers = workers.len()), level = "debug")]
pub fn run_all(
    workers: &mut [Box<dyn WorkerThread>],
    pin_threads: bool,
) -> Vec<Result<(), ExecutorError>> {
    let cores = if pin_threads {
        affinity::get_core_num()
    } else {
        0
    };

    thread::scope(|scope| {
        let handles = workers
            .iter_mut()
            .enumerate()
            .map(|(index, worker)| {
                let name = worker.identity().to_string();

                thread::Builder::new()
                    .name(name.clone())
                    .spawn_scoped(scope, move || {
                        if cores > 0 {
                            let core = index % cores;

                            match affinity::set_thread_affinity([core]) {
                                Ok(()) => debug!(core, "Pinned worker thread"),
                                Err(error) => warn!("Failed to pin worker thread to core {core}: {error}"),
                            }
                        }

                        worker.run_thread();
                    })
                    .map(|handle| (name.clone(), handle))
                    .map_err(|error| {
                        error!(error = ?error, thread = %name, "Failed to spawn worker thread");

                        ExecutorError::Spawn(error)
                    })
            })
            .collect_vec();

        handles
            .into_iter()
            .map(|spawned| {
                let (name, handle) = spawned?;

                handle.join().map_err(|_| {
                    error!(thread = %name, "Worker thread panicked");

                    ExecutorError::Panicked(name)
                })
            })
            .collect_vec()
    })
}
