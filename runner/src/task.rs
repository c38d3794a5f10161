pub mod context;
pub mod outcome;


use crate::{
    config::{BarrierConfig, ConfigErrors, TaskConfiguration},
    distributed::{Supervisor, SupervisorPaths},
    executors::{local, ThreadEnv, ThreadIdentity, WorkerThread},
    registry::{TaskKind, TaskRegistry},
    storage::SharedStorage,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::{
    fmt::{Debug, Display},
    path::PathBuf,
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};
use tracing::{error, info, instrument, warn};

pub use context::TaskContext;
pub use outcome::{Outcomes, Phase};

/// Task specific hooks around the shared lifecycle
pub trait Task: Debug + Send {
    fn setup_task(&mut self, context: &mut TaskContext) -> bool;

    fn cleanup_task(&mut self, context: &mut TaskContext) -> bool;
}

/// (numeric id, node name, task type) of a task instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskIdentity {
    pub id: u32,
    pub node: String,
    pub task_type: String,
}

impl Display for TaskIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}@{}", self.task_type, self.id, self.node)
    }
}

/// Everything a task implementation gets handed at construction
#[derive(Debug, Clone)]
pub struct TaskEnv {
    pub identity: TaskIdentity,
    pub conf: Arc<TaskConfiguration>,
    pub storage: SharedStorage,
}

/// Node-wide settings shared by all tasks
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub threads: usize,
    pub out_dir: PathBuf,
    pub barrier: BarrierConfig,
    pub pin_threads: bool,
}

/// Lifecycle state, every failed transition ends in `Failed` which is never left again
///
/// `Running` is entered when the worker threads are started and kept until cleanup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Created,
    SetUp,
    Running,
    CleanedUp,
    Failed,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis() as u64)
        .unwrap_or(0)
}

/// Drives one task instance through setup, run and cleanup on this node
///
/// None of the lifecycle methods propagate errors, they log, record the failing component in
/// the outcome ledger and return `false`.
pub struct TaskRunner {
    identity: TaskIdentity,
    kind: TaskKind,
    task: Box<dyn Task>,
    conf: Arc<TaskConfiguration>,
    storage: SharedStorage,
    settings: RunSettings,
    supervisor: Option<Supervisor>,
    context: TaskContext,
    threads: Vec<Box<dyn WorkerThread>>,
    outcomes: Outcomes,
    state: TaskState,
}

impl TaskRunner {
    /// resolve the task type and instantiate its task, unknown types and bad properties fail here
    pub fn new(
        registry: &TaskRegistry,
        identity: TaskIdentity,
        storage: SharedStorage,
        settings: RunSettings,
    ) -> Result<Self, ConfigErrors> {
        let registered = registry.resolve(&identity.task_type)?;
        let env = TaskEnv {
            identity: identity.clone(),
            conf: Arc::clone(&registered.conf),
            storage: Arc::clone(&storage),
        };
        let task = (registered.kind.task)(&env)?;
        let context = (registered.kind.context)(&identity);
        let supervisor = registered.supervisor.as_ref().map(|templates| {
            Supervisor::new(
                Arc::clone(&storage),
                SupervisorPaths::render(templates, &identity.task_type, identity.id, &identity.node),
            )
        });

        Ok(Self {
            identity,
            kind: registered.kind,
            task,
            conf: Arc::clone(&registered.conf),
            storage,
            settings,
            supervisor,
            context,
            threads: Vec::new(),
            outcomes: Outcomes::default(),
            state: TaskState::Created,
        })
    }

    pub fn identity(&self) -> &TaskIdentity {
        &self.identity
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn context(&self) -> &TaskContext {
        &self.context
    }

    pub fn outcomes(&self) -> &Outcomes {
        &self.outcomes
    }

    pub fn threads(&self) -> &[Box<dyn WorkerThread>] {
        &self.threads
    }

    pub fn supervisor(&self) -> Option<&Supervisor> {
        self.supervisor.as_ref()
    }

    pub fn report_path(&self) -> PathBuf {
        self.context.report_path(&self.settings.out_dir)
    }

    fn fail(&mut self) -> bool {
        self.state = TaskState::Failed;

        false
    }

    /// Prepare the task and construct its worker threads
    ///
    /// Can be called again before the run to start over, stale supervisor markers of an earlier
    /// run are removed first. A failing thread setup doesn't stop the remaining ones. `Failed`
    /// and `CleanedUp` are final, setup refuses to leave them.
    #[instrument(skip(self), fields(task = %self.identity))]
    pub fn setup(&mut self) -> bool {
        if matches!(self.state, TaskState::Failed | TaskState::CleanedUp) {
            warn!(state = ?self.state, "Refusing to set up a finished task");

            return self.fail();
        }

        self.outcomes = Outcomes::default();
        self.threads.clear();
        self.context = (self.kind.context)(&self.identity);

        if let Some(supervisor) = self.supervisor.as_ref() {
            if let Err(error) = supervisor.clear_stale() {
                error!(error = ?error, "Failed to setup supervised task: {error}");
                self.outcomes.record_error(Phase::Setup, "supervisor", &error);

                return self.fail();
            }
        }

        self.context.start_time_ms = now_ms();
        let task_ok = self.task.setup_task(&mut self.context);
        if !task_ok {
            warn!("Task setup hook failed");
        }
        self.outcomes.record(Phase::Setup, "task", task_ok);

        let mut threads = Vec::with_capacity(self.settings.threads);
        for index in 0..self.settings.threads {
            let env = ThreadEnv {
                identity: ThreadIdentity {
                    index,
                    task_id: self.identity.id,
                    node: self.identity.node.clone(),
                    task_type: self.identity.task_type.clone(),
                },
                storage: Arc::clone(&self.storage),
                barrier: self.settings.barrier.clone(),
            };

            match (self.kind.thread)(env) {
                Ok(thread) => threads.push(thread),
                Err(error) => {
                    error!(error = ?error, index, "Error creating task thread: {error}");
                    self.outcomes
                        .record_error(Phase::Setup, format!("thread-{index}"), &error);

                    return self.fail();
                }
            }
        }

        let conf = &self.conf;
        let results = threads
            .par_iter_mut()
            .map(|thread| thread.setup_thread(conf))
            .collect::<Vec<_>>();

        for (index, ok) in results.into_iter().enumerate() {
            if !ok {
                warn!(index, "Worker thread setup failed");
            }
            self.outcomes.record(Phase::Setup, format!("thread-{index}"), ok);
        }
        self.threads = threads;

        if self.outcomes.phase_ok(Phase::Setup) {
            info!(threads = self.threads.len(), "Task set up");
            self.state = TaskState::SetUp;

            true
        } else {
            self.fail()
        }
    }

    /// Start all worker threads and wait for every one of them to terminate
    ///
    /// A supervised task creates its `ready` marker before the first thread starts.
    #[instrument(skip(self), fields(task = %self.identity))]
    pub fn run(&mut self) -> bool {
        if self.state != TaskState::SetUp {
            warn!(state = ?self.state, "Refusing to run a task that isn't set up");
            self.outcomes
                .record_error(Phase::Run, "task", format!("not set up ({:?})", self.state));

            return self.fail();
        }

        self.state = TaskState::Running;

        if let Some(supervisor) = self.supervisor.as_ref() {
            if let Err(error) = supervisor.signal_ready() {
                error!(error = ?error, "Error when run task: {error}");
                self.outcomes.record_error(Phase::Run, "supervisor", &error);

                return self.fail();
            }
        }

        info!(threads = self.threads.len(), "Starting worker threads");
        let results = local::run_all(&mut self.threads, self.settings.pin_threads);

        for (index, result) in results.into_iter().enumerate() {
            match result {
                Ok(()) => {
                    self.outcomes.record(Phase::Run, format!("thread-{index}"), true);
                }
                Err(error) => {
                    self.outcomes
                        .record_error(Phase::Run, format!("thread-{index}"), &error);
                }
            }
        }

        if self.outcomes.phase_ok(Phase::Run) {
            info!("All worker threads finished");

            true
        } else {
            error!("Error when waiting for all worker threads");

            self.fail()
        }
    }

    /// Clean up threads and task, write the final supervisor marker and the report
    ///
    /// Also runs for a `Failed` task so the report and the `failed` marker are produced, the
    /// task stays `Failed` though. The return value only reflects the cleanup phase.
    #[instrument(skip(self), fields(task = %self.identity))]
    pub fn cleanup(&mut self) -> bool {
        if matches!(self.state, TaskState::Created | TaskState::CleanedUp) {
            warn!(state = ?self.state, "Refusing to clean up a task that wasn't set up");
            self.outcomes
                .record_error(Phase::Cleanup, "task", format!("not set up ({:?})", self.state));

            return self.fail();
        }
        let failed = self.state == TaskState::Failed;

        let conf = &self.conf;
        let results = self
            .threads
            .par_iter_mut()
            .map(|thread| thread.cleanup_thread(conf))
            .collect::<Vec<_>>();

        for (index, ok) in results.into_iter().enumerate() {
            if !ok {
                warn!(index, "Worker thread cleanup failed");
            }
            self.outcomes.record(Phase::Cleanup, format!("thread-{index}"), ok);
        }

        let task_ok = self.task.cleanup_task(&mut self.context);
        self.outcomes.record(Phase::Cleanup, "task", task_ok);

        self.context.set_from_threads(&self.threads);
        self.context.success &=
            self.threads.len() == self.settings.threads && self.outcomes.all_ok();
        self.context.finish_time_ms = now_ms().max(self.context.start_time_ms);

        if let Some(supervisor) = self.supervisor.as_ref() {
            if let Err(error) = supervisor.signal_outcome(self.context.success) {
                error!(error = ?error, "Failed to cleanup supervised task: {error}");
                self.outcomes.record_error(Phase::Cleanup, "supervisor", &error);
                self.context.success = false;
            }
        }

        // written last so it includes a failed marker write
        self.context.outcomes = self.outcomes.clone();
        let report = self.report_path();
        match self.context.write_to_file(&report) {
            Ok(()) => info!(report = ?report, "Wrote task report"),
            Err(error) => {
                error!(error = ?error, report = ?report, "Error when generating the task report: {error}");
                self.outcomes.record_error(Phase::Cleanup, "report", &error);
            }
        }

        for failure in self.outcomes.failures() {
            warn!(
                phase = ?failure.phase,
                component = %failure.component,
                error = ?failure.error,
                "Component failed"
            );
        }

        let cleaned_up = self.outcomes.phase_ok(Phase::Cleanup);
        if failed || !cleaned_up {
            self.state = TaskState::Failed;
        } else {
            self.state = TaskState::CleanedUp;
        }

        cleaned_up
    }

    /// setup, run (only after a successful setup) and always cleanup
    pub fn execute(&mut self) -> bool {
        let setup = self.setup();
        let run = if setup {
            self.run()
        } else {
            warn!(task = %self.identity, "Skipping run since setup failed");

            false
        };
        let cleanup = self.cleanup();

        setup && run && cleanup
    }
}
