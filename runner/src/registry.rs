use crate::{
    benchmarks,
    config::{ConfigErrors, PerfConfig, SupervisorTemplates, TaskConfiguration},
    executors::{ThreadEnv, WorkerThread},
    task::{Task, TaskContext, TaskEnv, TaskIdentity},
};
use once_cell::sync::OnceCell;
use std::{collections::BTreeMap, fmt::Debug, sync::Arc};
use tracing::{debug, info};
use tracing_unwrap::OptionExt;

pub type TaskFactory = fn(&TaskEnv) -> Result<Box<dyn Task>, ConfigErrors>;
pub type ContextFactory = fn(&TaskIdentity) -> TaskContext;
pub type ThreadFactory = fn(ThreadEnv) -> Result<Box<dyn WorkerThread>, ConfigErrors>;

/// Constructors making up one benchmark implementation
#[derive(Clone, Copy)]
pub struct TaskKind {
    pub name: &'static str,
    // whether the benchmark takes part in the supervisor protocol unless configured otherwise
    pub supervised: bool,
    pub task: TaskFactory,
    pub context: ContextFactory,
    pub thread: ThreadFactory,
}

impl Debug for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskKind")
            .field("name", &self.name)
            .field("supervised", &self.supervised)
            .finish_non_exhaustive()
    }
}

/// A task type as resolved from the configuration
#[derive(Debug, Clone)]
pub struct RegisteredTask {
    pub kind: TaskKind,
    pub conf: Arc<TaskConfiguration>,
    // present iff the task type is supervised, decided once at registration
    pub supervisor: Option<SupervisorTemplates>,
}

static REGISTRY: OnceCell<TaskRegistry> = OnceCell::new();

/// Maps task type names to their implementation
#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    types: BTreeMap<String, RegisteredTask>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        name: &str,
        kind: TaskKind,
        conf: TaskConfiguration,
        supervisor: Option<SupervisorTemplates>,
    ) {
        debug!(
            name = name,
            kind = kind.name,
            supervised = supervisor.is_some(),
            "Registered task type"
        );

        self.types.insert(
            name.to_owned(),
            RegisteredTask {
                kind,
                conf: Arc::new(conf),
                supervisor,
            },
        );
    }

    /// build the registry for every task type of the configuration
    pub fn from_config(config: &PerfConfig) -> Result<Self, ConfigErrors> {
        let mut registry = Self::new();

        for (name, task) in config.tasks.iter() {
            let kind = benchmarks::builtin(&task.kind)
                .ok_or_else(|| ConfigErrors::UnsupportedKind(task.kind.clone()))?;
            let supervised = task.supervised.unwrap_or(kind.supervised);

            registry.register(
                name,
                kind,
                TaskConfiguration::new(name.as_str(), task.properties.clone()),
                supervised.then(|| config.supervisor.clone()),
            );
        }

        Ok(registry)
    }

    pub fn resolve(&self, name: &str) -> Result<&RegisteredTask, ConfigErrors> {
        self.types
            .get(name)
            .ok_or_else(|| ConfigErrors::UnknownTaskType(name.to_owned()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &RegisteredTask)> {
        self.types.iter()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Make this the process-wide registry, can only happen once per process
    pub fn install(self) -> Result<&'static TaskRegistry, ConfigErrors> {
        let count = self.len();

        REGISTRY
            .set(self)
            .map_err(|_| ConfigErrors::RegistryInitialized)?;
        info!(task_types = count, "Installed task registry");

        Ok(REGISTRY.get().expect_or_log("Registry was set above"))
    }

    /// the installed registry, if any
    pub fn global() -> Option<&'static TaskRegistry> {
        REGISTRY.get()
    }
}
