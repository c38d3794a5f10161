use crate::{
    config::BarrierConfig,
    storage::{memory::MemoryStorage, Reader, SharedStorage, Storage, StorageError, Writer},
    task::RunSettings,
};
use parking_lot::Mutex;
use serde_yaml::Value;
use std::{collections::BTreeMap, path::Path, sync::Arc};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Created(String),
    Deleted(String),
}

/// Memory storage logging every create and delete in the order they became visible
#[derive(Debug, Clone, Default)]
pub struct RecordingStorage {
    inner: MemoryStorage,
    events: Arc<Mutex<Vec<Event>>>,
}

impl RecordingStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }
}

impl Storage for RecordingStorage {
    fn exists(&self, path: &str) -> Result<bool, StorageError> {
        self.inner.exists(path)
    }

    fn create(&self, path: &str) -> Result<Writer, StorageError> {
        // the log lock is held across the operation so the log order matches visibility
        let mut events = self.events.lock();
        let writer = self.inner.create(path)?;
        events.push(Event::Created(path.to_owned()));

        Ok(writer)
    }

    fn delete(&self, path: &str, recursive: bool) -> Result<bool, StorageError> {
        let mut events = self.events.lock();
        let deleted = self.inner.delete(path, recursive)?;
        if deleted {
            events.push(Event::Deleted(path.to_owned()));
        }

        Ok(deleted)
    }

    fn list(&self, path: &str) -> Result<Vec<String>, StorageError> {
        self.inner.list(path)
    }

    fn mkdirs(&self, path: &str) -> Result<(), StorageError> {
        self.inner.mkdirs(path)
    }

    fn open_read(&self, path: &str) -> Result<Reader, StorageError> {
        self.inner.open_read(path)
    }

    fn open_write(&self, path: &str) -> Result<Writer, StorageError> {
        self.inner.open_write(path)
    }
}

pub fn memory_storage() -> SharedStorage {
    Arc::new(MemoryStorage::new())
}

pub fn fast_barrier() -> BarrierConfig {
    BarrierConfig {
        poll_interval_ms: 2,
        timeout_ms: Some(10_000),
    }
}

pub fn settings(threads: usize, out_dir: &Path) -> RunSettings {
    RunSettings {
        threads,
        out_dir: out_dir.to_path_buf(),
        barrier: fast_barrier(),
        pin_threads: false,
    }
}

pub fn properties(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
    pairs
        .iter()
        .map(|(key, value)| ((*key).to_owned(), value.clone()))
        .collect()
}

pub fn iterate_properties(work_dir: &str, iterations: u64, shuffle: bool) -> BTreeMap<String, Value> {
    properties(&[
        ("buffer.size.bytes", Value::from(512)),
        ("file.length.bytes", Value::from(2048)),
        ("iterations", Value::from(iterations)),
        ("read.files.per.thread", Value::from(3)),
        ("shuffle.mode", Value::from(shuffle)),
        ("work.dir", Value::from(work_dir)),
        ("write.files.per.thread", Value::from(2)),
    ])
}
