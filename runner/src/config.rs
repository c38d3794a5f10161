pub mod properties;

use crate::{benchmarks, storage::StorageError, task::RunSettings};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs, path::Path, path::PathBuf, time::Duration};
use thiserror::Error;
use tracing::{debug, error, warn};

pub use properties::TaskConfiguration;

#[derive(Error, Debug)]
pub enum ConfigErrors {
    #[error("Failed to read configuration file")]
    ReadConfig(#[from] std::io::Error),
    #[error("Failed to parse configuration")]
    ParseConfig(#[from] serde_yaml::Error),
    #[error("Configuration failed preflight checks")]
    InvalidConfig,
    #[error("Task type '{0}' is not defined")]
    UnknownTaskType(String),
    #[error("Benchmark kind '{0}' is not supported")]
    UnsupportedKind(String),
    #[error("Property '{0}' is missing")]
    MissingProperty(String),
    #[error("Property '{key}' is malformed, expected {expected}")]
    MalformedProperty { key: String, expected: &'static str },
    #[error("Task registry was already initialized")]
    RegistryInitialized,
    #[error("Failed to determine the node name")]
    NodeName(#[from] nix::Error),
    #[error("Storage backend failed to load")]
    Storage(#[from] StorageError),
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct PerfConfig {
    // name of this node, falls back to the hostname
    #[serde(default)]
    pub node: Option<String>,
    // worker threads per task
    pub threads: usize,
    // directory receiving the per-task reports
    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,
    pub storage: StorageConfig,
    #[serde(default)]
    pub barrier: BarrierConfig,
    // pin worker thread i to core i mod cores
    #[serde(default)]
    pub pin_threads: bool,
    #[serde(default)]
    pub supervisor: SupervisorTemplates,
    // task type name -> benchmark
    pub tasks: BTreeMap<String, TaskTypeConfig>,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(deny_unknown_fields, tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    Local { root: PathBuf },
    Memory,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct BarrierConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    // no timeout means waiting forever for stalled participants
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// Marker path templates, `{type}`, `{id}` and `{node}` are substituted per run
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SupervisorTemplates {
    pub ready: String,
    pub success: String,
    pub failed: String,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct TaskTypeConfig {
    // name of the built-in benchmark implementing this task type
    pub kind: String,
    // overrides whether the benchmark takes part in the supervisor protocol
    #[serde(default)]
    pub supervised: Option<bool>,
    #[serde(default)]
    pub properties: BTreeMap<String, serde_yaml::Value>,
}

impl Default for BarrierConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            timeout_ms: None,
        }
    }
}

impl BarrierConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

impl Default for SupervisorTemplates {
    fn default() -> Self {
        Self {
            ready: "/dperf/supervisor/{type}-{id}@{node}.ready".to_owned(),
            success: "/dperf/supervisor/{type}-{id}@{node}.success".to_owned(),
            failed: "/dperf/supervisor/{type}-{id}@{node}.failed".to_owned(),
        }
    }
}

impl PerfConfig {
    /// read, parse and check a configuration file
    pub fn load(path: &Path) -> Result<Self, ConfigErrors> {
        let content = fs::read_to_string(path)?;
        let mut config: Self = serde_yaml::from_str(&content)?;

        debug!(path = ?path, "Loaded configuration");
        config.preflight_checks()?;

        Ok(config)
    }

    pub fn settings(&self) -> RunSettings {
        RunSettings {
            threads: self.threads,
            out_dir: self.out_dir.clone(),
            barrier: self.barrier.clone(),
            pin_threads: self.pin_threads,
        }
    }

    /// Validate the whole configuration, every problem is logged before failing
    pub fn preflight_checks(&mut self) -> Result<(), ConfigErrors> {
        let mut contains_error = false;

        if self.threads == 0 {
            error!("threads must be at least 1");
            contains_error = true;
        }

        if self.tasks.is_empty() {
            error!("No task type was defined, nothing could be run");
            contains_error = true;
        }

        if let Some(node) = self.node.as_ref() {
            if node.trim().is_empty() {
                error!("node must not be empty, remove it to fall back to the hostname");
                contains_error = true;
            }
        }

        if self.barrier.poll_interval_ms == 0 {
            error!("barrier.poll_interval_ms cannot be 0, this would busy-loop on the storage backend");
            contains_error = true;
        }

        if self.barrier.timeout_ms == Some(0) {
            warn!("barrier.timeout_ms is 0, every barrier that isn't open immediately will stall");
        }

        for (name, template) in [
            ("ready", &self.supervisor.ready),
            ("success", &self.supervisor.success),
            ("failed", &self.supervisor.failed),
        ] {
            if template.trim().is_empty() {
                error!("supervisor.{name} must not be empty");
                contains_error = true;
            }
        }

        let markers = [
            &self.supervisor.ready,
            &self.supervisor.success,
            &self.supervisor.failed,
        ];
        if markers[0] == markers[1] || markers[1] == markers[2] || markers[0] == markers[2] {
            error!("supervisor markers must use three distinct paths");
            contains_error = true;
        }

        for (name, task) in self.tasks.iter_mut() {
            task.kind = task.kind.to_lowercase();

            if benchmarks::builtin(&task.kind).is_none() {
                error!(
                    "tasks.{name}.kind ({}) is not supported, please use one of {:?}",
                    task.kind,
                    benchmarks::BUILTIN
                );
                contains_error = true;
            }
        }

        if contains_error {
            Err(ConfigErrors::InvalidConfig)
        } else {
            Ok(())
        }
    }
}

fn default_out_dir() -> PathBuf {
    PathBuf::from("reports")
}

fn default_poll_interval() -> u64 {
    300
}
