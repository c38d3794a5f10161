pub mod local;
pub mod memory;

use crate::config::StorageConfig;
use itertools::Itertools;
use std::{
    fmt::Debug,
    io::{self, Read, Write},
    sync::Arc,
};
use thiserror::Error;
use tracing::info;

pub type Reader = Box<dyn Read + Send>;
pub type Writer = Box<dyn Write + Send>;

/// storage handle shared between the task, its worker threads and the supervisor
pub type SharedStorage = Arc<dyn Storage>;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Path not found: {0}")]
    NotFound(String),
    #[error("Path is a directory: {0}")]
    IsDirectory(String),
    #[error("Path component is not a directory: {0}")]
    NotADirectory(String),
    #[error("Directory is not empty: {0}")]
    NotEmpty(String),
    #[error("Storage backend I/O failed")]
    Io(#[from] io::Error),
}

/// Hierarchical namespace shared by every node of a benchmark run.
///
/// Paths are `/`-separated and always interpreted relative to the backend root. Parent
/// directories are created implicitly by `create`.
pub trait Storage: Debug + Send + Sync {
    fn exists(&self, path: &str) -> Result<bool, StorageError>;

    /// create (or truncate) a file and return a writer for it
    fn create(&self, path: &str) -> Result<Writer, StorageError>;

    /// delete a file or directory, returns false if nothing was found
    fn delete(&self, path: &str, recursive: bool) -> Result<bool, StorageError>;

    /// sorted, direct children of `path` as full paths, empty if `path` doesn't exist
    fn list(&self, path: &str) -> Result<Vec<String>, StorageError>;

    fn mkdirs(&self, path: &str) -> Result<(), StorageError>;

    fn open_read(&self, path: &str) -> Result<Reader, StorageError>;

    /// open an existing file for appending
    fn open_write(&self, path: &str) -> Result<Writer, StorageError>;

    fn create_empty(&self, path: &str) -> Result<(), StorageError> {
        let mut writer = self.create(path)?;
        writer.flush()?;

        Ok(())
    }
}

/// join two path fragments with exactly one separator
pub fn join(parent: &str, child: &str) -> String {
    format!(
        "{}/{}",
        parent.trim_end_matches('/'),
        child.trim_start_matches('/')
    )
}

/// Normalize a path to `/a/b/c`, the root is `/`
///
/// `.` and `..` are resolved lexically, `..` never climbs above the root.
pub fn normalize(path: &str) -> String {
    let mut parts = Vec::new();

    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            part => parts.push(part),
        }
    }

    format!("/{}", parts.iter().join("/"))
}

pub fn load(config: &StorageConfig) -> Result<SharedStorage, StorageError> {
    match config {
        StorageConfig::Local { root } => {
            info!(root = ?root, "Using local storage backend");

            Ok(Arc::new(local::LocalStorage::open(root)?))
        }
        StorageConfig::Memory => {
            info!("Using in-memory storage backend");

            Ok(Arc::new(memory::MemoryStorage::new()))
        }
    }
}
