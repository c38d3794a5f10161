use clap::{ArgAction, Parser, Subcommand};
use dperf_runner::{
    config::{ConfigErrors, PerfConfig},
    distributed::util::node_name,
    registry::TaskRegistry,
    storage,
    task::{TaskIdentity, TaskRunner},
};
use std::{path::Path, path::PathBuf, process::ExitCode};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Distributed storage benchmark driver
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// raise log verbosity, ignored if RUST_LOG is set
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one task on this node: setup, run and cleanup
    Run {
        #[arg(short, long)]
        config: PathBuf,
        /// task type as named in the configuration
        #[arg(short, long)]
        task: String,
        /// id of the task, unique among all nodes of the run
        #[arg(long, default_value_t = 0)]
        id: u32,
        /// overrides the configured node name
        #[arg(short, long)]
        node: Option<String>,
    },
    /// List the configured task types
    Types {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Remove the work directory of a task type from the storage backend
    Clean {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        task: String,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .init();
}

fn run(path: &Path, task_type: &str, id: u32, node: Option<&str>) -> Result<bool, ConfigErrors> {
    let config = PerfConfig::load(path)?;
    let node = node_name(node.or(config.node.as_deref()))?;
    let registry = TaskRegistry::from_config(&config)?.install()?;
    let storage = storage::load(&config.storage)?;

    let identity = TaskIdentity {
        id,
        node,
        task_type: task_type.to_owned(),
    };
    let mut runner = TaskRunner::new(registry, identity, storage, config.settings())?;

    let success = runner.execute();
    if success {
        info!(report = ?runner.report_path(), "Task finished successfully");
    } else {
        error!(
            report = ?runner.report_path(),
            failures = runner.outcomes().failures().count(),
            "Task failed"
        );
    }

    Ok(success)
}

fn types(path: &Path) -> Result<bool, ConfigErrors> {
    let config = PerfConfig::load(path)?;
    let registry = TaskRegistry::from_config(&config)?;

    for (name, registered) in registry.iter() {
        println!(
            "{name}\tkind={}\tsupervised={}",
            registered.kind.name,
            registered.supervisor.is_some()
        );
    }

    Ok(true)
}

fn clean(path: &Path, task_type: &str) -> Result<bool, ConfigErrors> {
    let config = PerfConfig::load(path)?;
    let registry = TaskRegistry::from_config(&config)?;
    let work_dir = registry.resolve(task_type)?.conf.get_property("work.dir")?;
    let storage = storage::load(&config.storage)?;

    match storage.delete(&work_dir, true) {
        Ok(true) => info!(work_dir = %work_dir, "Removed work directory"),
        Ok(false) => warn!(work_dir = %work_dir, "Work directory didn't exist"),
        Err(error) => {
            error!(error = ?error, work_dir = %work_dir, "Failed to remove work directory");

            return Ok(false);
        }
    }

    Ok(true)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Command::Run {
            config,
            task,
            id,
            node,
        } => run(&config, &task, id, node.as_deref()),
        Command::Types { config } => types(&config),
        Command::Clean { config, task } => clean(&config, &task),
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(error) => {
            error!(error = ?error, "{error}");

            ExitCode::FAILURE
        }
    }
}
