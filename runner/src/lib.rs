pub mod benchmarks;
pub mod config;
pub mod distributed;
pub mod executors;
pub mod registry;
pub mod storage;
pub mod task;
pub mod throughput;

#[cfg(test)]
mod storage_test;
#[cfg(test)]
mod test_util;
