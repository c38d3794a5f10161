//! Coordination between nodes of a distributed run.
//!
//! Nodes never talk to each other directly, every signal is the existence (or absence) of a
//! file in the shared storage backend:
//! - the sync barrier keeps worker threads of all nodes in lock step between iterations
//! - the supervisor markers tell an external collector whether a run finished and how

pub mod barrier;
pub mod supervisor;
pub mod util;

#[cfg(test)]
mod barrier_test;

pub use barrier::{BarrierError, SyncBarrier};
pub use supervisor::{Supervisor, SupervisorPaths};
