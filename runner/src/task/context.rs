use super::{outcome::Outcomes, TaskIdentity};
use crate::executors::WorkerThread;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs,
    io,
    path::{Path, PathBuf},
};
use thiserror::Error;

/// file name prefix of the per-task reports
pub const CONTEXT_FILE_PREFIX: &str = "context";

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to access report file")]
    Io(#[from] io::Error),
    #[error("Failed to (de)serialize report")]
    Serialize(#[from] serde_yaml::Error),
}

/// How the per-thread values of a metric are folded into a task total
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reduction {
    Sum,
    Mean,
    Min,
    Max,
}

impl Reduction {
    pub fn reduce(&self, values: &[f64]) -> f64 {
        if values.is_empty() {
            return 0.0;
        }

        match self {
            Self::Sum => values.iter().sum(),
            Self::Mean => values.iter().sum::<f64>() / values.len() as f64,
            Self::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            Self::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

/// Run record of one task instance, persisted as the node's report
///
/// Only touched by the owning task, worker results are merged in after all threads terminated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskContext {
    pub task_type: String,
    pub id: u32,
    pub node: String,
    // milliseconds since the unix epoch
    pub start_time_ms: u64,
    pub finish_time_ms: u64,
    pub success: bool,
    // metric name -> value per thread, indexed by thread id
    #[serde(default)]
    pub metrics: BTreeMap<String, Vec<f64>>,
    #[serde(default)]
    pub totals: BTreeMap<String, f64>,
    #[serde(default)]
    pub reductions: BTreeMap<String, Reduction>,
    #[serde(default)]
    pub outcomes: Outcomes,
}

impl TaskContext {
    pub fn new(identity: &TaskIdentity) -> Self {
        Self {
            task_type: identity.task_type.clone(),
            id: identity.id,
            node: identity.node.clone(),
            start_time_ms: 0,
            finish_time_ms: 0,
            success: false,
            metrics: BTreeMap::new(),
            totals: BTreeMap::new(),
            reductions: BTreeMap::new(),
            outcomes: Outcomes::default(),
        }
    }

    /// declare a metric together with how its task total is computed
    pub fn with_reduction(mut self, metric: &str, reduction: Reduction) -> Self {
        self.reductions.insert(metric.to_owned(), reduction);
        self
    }

    /// Merge the results of terminated worker threads
    ///
    /// `success` becomes the AND over all thread flags, metric vectors are indexed by thread.
    pub fn set_from_threads(&mut self, threads: &[Box<dyn WorkerThread>]) {
        self.success = threads.iter().all(|thread| thread.success());
        self.metrics.clear();

        for (index, thread) in threads.iter().enumerate() {
            for (name, value) in thread.metrics() {
                let values = self
                    .metrics
                    .entry(name.to_owned())
                    .or_insert_with(|| vec![0.0; threads.len()]);
                values[index] = value;
            }
        }

        self.totals = self
            .reductions
            .iter()
            .map(|(metric, reduction)| {
                let values = self.metrics.get(metric).map(Vec::as_slice).unwrap_or(&[]);

                (metric.clone(), reduction.reduce(values))
            })
            .collect();
    }

    pub fn report_path(&self, out_dir: &Path) -> PathBuf {
        out_dir.join(format!(
            "{CONTEXT_FILE_PREFIX}{}-{}@{}",
            self.task_type, self.id, self.node
        ))
    }

    pub fn write_to_file(&self, path: &Path) -> Result<(), ReportError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, serde_yaml::to_string(self)?)?;

        Ok(())
    }

    pub fn read_from_file(path: &Path) -> Result<Self, ReportError> {
        Ok(serde_yaml::from_str(&fs::read_to_string(path)?)?)
    }
}
