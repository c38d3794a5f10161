use super::util::render;
use crate::{
    config::SupervisorTemplates,
    storage::{SharedStorage, StorageError},
};
use tracing::{debug, info};

/// Concrete marker paths of one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorPaths {
    pub ready: String,
    pub success: String,
    pub failed: String,
}

impl SupervisorPaths {
    pub fn render(templates: &SupervisorTemplates, task_type: &str, id: u32, node: &str) -> Self {
        Self {
            ready: render(&templates.ready, task_type, id, node),
            success: render(&templates.success, task_type, id, node),
            failed: render(&templates.failed, task_type, id, node),
        }
    }
}

/// Signals the state of a run to an external collector through marker files
///
/// Only the existence of a marker matters, never its content. `ready` appears before the first
/// worker thread starts and is left in place, exactly one of `success`/`failed` appears once
/// the run is cleaned up.
#[derive(Debug, Clone)]
pub struct Supervisor {
    storage: SharedStorage,
    paths: SupervisorPaths,
}

impl Supervisor {
    pub fn new(storage: SharedStorage, paths: SupervisorPaths) -> Self {
        Self { storage, paths }
    }

    pub fn paths(&self) -> &SupervisorPaths {
        &self.paths
    }

    fn remove(&self, path: &str) -> Result<(), StorageError> {
        match self.storage.delete(path, true) {
            Ok(true) => {
                debug!(path = path, "Removed supervisor marker");

                Ok(())
            }
            Ok(false) | Err(StorageError::NotFound(_)) => Ok(()),
            Err(error) => Err(error),
        }
    }

    /// remove markers left over by a previous run, missing markers are fine
    pub fn clear_stale(&self) -> Result<(), StorageError> {
        for path in [&self.paths.failed, &self.paths.ready, &self.paths.success] {
            if self.storage.exists(path)? {
                self.remove(path)?;
            }
        }

        Ok(())
    }

    pub fn signal_ready(&self) -> Result<(), StorageError> {
        self.storage.create_empty(&self.paths.ready)?;
        info!(path = %self.paths.ready, "Signaled ready");

        Ok(())
    }

    /// write the final marker, the opposite one is removed first so at most one exists
    pub fn signal_outcome(&self, success: bool) -> Result<(), StorageError> {
        let (marker, opposite) = if success {
            (&self.paths.success, &self.paths.failed)
        } else {
            (&self.paths.failed, &self.paths.success)
        };

        self.remove(opposite)?;
        self.storage.create_empty(marker)?;
        info!(path = %marker, success, "Signaled outcome");

        Ok(())
    }
}
