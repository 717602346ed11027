//! progmon CLI - goal and task progress monitor.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use progmon_core::{Error, Recovery, Task};
use progmon_progress::{progress_bar, Monitor, MonitorConfig};
use progmon_storage::{write_text_atomic, StateStore};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "progmon")]
#[command(about = "Track progress toward a goal, with checkpoints and failure recovery", long_about = None)]
struct Cli {
    /// State file to read and write
    #[arg(long, global = true, env = "PROGMON_STATE_FILE", default_value = "progress_state.json")]
    state_file: PathBuf,

    /// Do not persist changes made by this command
    #[arg(long, global = true)]
    no_save: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Commands {
    /// Create a new goal
    Init {
        /// Goal description
        goal: String,
        /// Replace an existing state file
        #[arg(long)]
        force: bool,
    },
    /// Add a pending task
    Add {
        /// Task ID
        id: String,
        /// Task name
        name: String,
        /// Task description
        #[arg(long, short, default_value = "")]
        description: String,
    },
    /// Start a pending task
    Start {
        /// Task ID
        id: String,
    },
    /// Set a task's progress, optionally recording a checkpoint
    Update {
        /// Task ID
        id: String,
        /// Progress percentage (0-100)
        #[arg(allow_negative_numbers = true)]
        percentage: f64,
        /// Checkpoint label
        #[arg(long, short)]
        label: Option<String>,
    },
    /// Complete a task at 100%
    Complete {
        /// Task ID
        id: String,
    },
    /// Mark a task as failed
    Fail {
        /// Task ID
        id: String,
        /// Failure reason
        reason: String,
    },
    /// Resume a failed task from its last checkpoint
    Recover {
        /// Task ID
        id: String,
        /// Also reset progress to the checkpoint
        #[arg(long)]
        apply: bool,
    },
    /// Show status
    Status {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Show task details
    Show {
        /// Task ID
        id: String,
    },
    /// Write a status report to a file
    Report {
        /// Output path
        output: PathBuf,
        /// Write JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Delete the state file
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = MonitorConfig::new(&cli.state_file).with_auto_save(!cli.no_save);
    run(cli.command, &config).await
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(command: Commands, config: &MonitorConfig) -> Result<()> {
    match command {
        Commands::Init { goal, force } => {
            let store = config.store();
            if store.exists().await? && !force {
                bail!(
                    "{} already exists; use --force to replace it",
                    config.state_file.display()
                );
            }
            let monitor = Monitor::new(goal, config);
            persist(&monitor, config).await?;
            println!("Created goal: {}", monitor.goal());
        }
        Commands::Add { id, name, description } => {
            let mut monitor = open(config).await?;
            let task = monitor.add_task(id, name, description)?;
            println!("Added task: {} - {}", task.id(), task.name());
            persist(&monitor, config).await?;
        }
        Commands::Start { id } => {
            let mut monitor = open(config).await?;
            monitor.start(&id)?;
            println!("Started task: {}", id);
            persist(&monitor, config).await?;
        }
        Commands::Update { id, percentage, label } => {
            let mut monitor = open(config).await?;
            monitor.update_progress(&id, percentage, label.as_deref())?;
            match label.as_deref().filter(|l| !l.trim().is_empty()) {
                Some(label) => println!("Task {} at {:.1}% (checkpoint: {})", id, percentage, label),
                None => println!("Task {} at {:.1}%", id, percentage),
            }
            persist(&monitor, config).await?;
        }
        Commands::Complete { id } => {
            let mut monitor = open(config).await?;
            monitor.complete(&id)?;
            println!("Completed task: {}", id);
            if monitor.is_goal_achieved() {
                println!("Goal achieved: {}", monitor.goal());
            }
            persist(&monitor, config).await?;
        }
        Commands::Fail { id, reason } => {
            let mut monitor = open(config).await?;
            monitor.fail(&id, reason.as_str())?;
            println!("Task {} failed: {}", id, reason);
            persist(&monitor, config).await?;
        }
        Commands::Recover { id, apply } => {
            let mut monitor = open(config).await?;
            let recovery = monitor.recover(&id)?;
            match &recovery {
                Recovery::Checkpoint(cp) => println!(
                    "Recovered task {} from checkpoint #{} at {:.1}%: {}",
                    id, cp.sequence_index, cp.progress_percentage, cp.label
                ),
                Recovery::FreshStart => {
                    println!("Recovered task {} with no checkpoint; fresh start at 0%", id)
                }
            }
            if apply {
                monitor.update_progress(&id, recovery.percentage(), None)?;
                println!("Progress reset to {:.1}%", recovery.percentage());
            }
            persist(&monitor, config).await?;
        }
        Commands::Status { json } => {
            let monitor = open(config).await?;
            let report = monitor.status_report();
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", report);
            }
        }
        Commands::Show { id } => {
            let monitor = open(config).await?;
            print_task(monitor.get_task(&id)?);
        }
        Commands::Report { output, json } => {
            let monitor = open(config).await?;
            let report = monitor.status_report();
            let content = if json {
                serde_json::to_string_pretty(&report)?
            } else {
                report.to_string()
            };
            write_text_atomic(&output, &format!("{}\n", content))
                .await
                .with_context(|| format!("failed to write report to {}", output.display()))?;
            println!("Report written to {}", output.display());
        }
        Commands::Reset => {
            if config.store().delete().await? {
                println!("Deleted {}", config.state_file.display());
            } else {
                println!("Nothing to delete at {}", config.state_file.display());
            }
        }
    }

    Ok(())
}

/// Load the monitor, pointing at `init` when there is no state yet.
async fn open(config: &MonitorConfig) -> Result<Monitor> {
    match Monitor::load(config).await {
        Ok(monitor) => Ok(monitor),
        Err(Error::NotFound(what)) => bail!("{} not found; run `progmon init <goal>` first", what),
        Err(e) => Err(e).with_context(|| format!("failed to load {}", config.state_file.display())),
    }
}

async fn persist(monitor: &Monitor, config: &MonitorConfig) -> Result<()> {
    if !config.auto_save {
        debug!("auto-save disabled, changes not persisted");
        eprintln!("(not saved)");
        return Ok(());
    }
    monitor
        .save()
        .await
        .with_context(|| format!("failed to save {}", config.state_file.display()))?;
    info!(path = %config.state_file.display(), "state saved");
    Ok(())
}

fn print_task(task: &Task) {
    println!("Task: {}", task.id());
    println!("  Name: {}", task.name());
    if !task.description().is_empty() {
        println!("  Description: {}", task.description());
    }
    println!("  Status: {}", task.status().as_str().to_uppercase());
    println!(
        "  Progress: {} {:.1}%",
        progress_bar(task.progress_percentage(), 20),
        task.progress_percentage()
    );
    if let Some(reason) = task.failure_reason() {
        println!("  Failure: {}", reason);
    }
    println!("  Created: {}", task.created_at());
    println!("  Updated: {}", task.updated_at());

    println!("  Checkpoints ({})", task.checkpoints().len());
    for cp in task.checkpoints() {
        println!(
            "    #{} {:>5.1}% {} - {}",
            cp.sequence_index, cp.progress_percentage, cp.timestamp, cp.label
        );
    }
}
