//! Dependency-graph task runner.
//!
//! Builds (or loads) a plan of phased, interdependent tasks, runs it with
//! bounded retries and adaptive remediation, and stores the updated plan and
//! the run log under the configured directories.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use taskflow::core::builder::PlanBuilder;
use taskflow::core::ids::RandomIds;
use taskflow::exit_codes;
use taskflow::io::config::{AppConfig, DEFAULT_CONFIG_FILE, load_config};
use taskflow::io::executors::default_registry;
use taskflow::io::plan_store::PlanStore;
use taskflow::logging;
use taskflow::plan::{Plan, RunLogEntry};
use taskflow::report::{render_plan, render_summary};
use taskflow::scheduler::{DeadlockError, Scheduler};

#[derive(Parser)]
#[command(
    name = "taskflow",
    version,
    about = "Dependency-graph task runner with retries and adaptive remediation"
)]
struct Cli {
    /// Path to the TOML config file (defaults apply when it does not exist).
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Log scheduler progress to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build a plan for a goal and save it without running it.
    Plan {
        /// High-level goal.
        goal: String,
        /// Extra context embedded in the plan.
        #[arg(long)]
        context: Option<String>,
    },
    /// Run a plan built from a goal, or loaded with `--plan`.
    Run {
        /// High-level goal.
        goal: Option<String>,
        /// Run an existing plan file instead of building one.
        #[arg(long, conflicts_with = "goal")]
        plan: Option<PathBuf>,
        /// Extra context embedded in a newly built plan.
        #[arg(long, requires = "goal")]
        context: Option<String>,
        /// Additional tries per task after the first (overrides the config).
        #[arg(long)]
        max_retries: Option<u32>,
    },
    /// Load a plan file and check its structure and dependency graph.
    Validate {
        /// Plan file to check.
        path: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            let code = if err.downcast_ref::<DeadlockError>().is_some() {
                exit_codes::DEADLOCK
            } else {
                exit_codes::INVALID
            };
            std::process::exit(code);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    let root = std::env::current_dir().context("resolve working directory")?;
    let cfg = load_config(&cli.config)?;
    match cli.command {
        Command::Plan { goal, context } => cmd_plan(&root, &cfg, &goal, context.as_deref()),
        Command::Run {
            goal,
            plan,
            context,
            max_retries,
        } => cmd_run(&root, cfg, goal, plan, context, max_retries),
        Command::Validate { path } => cmd_validate(&root, &cfg, &path),
    }
}

fn cmd_plan(root: &Path, cfg: &AppConfig, goal: &str, context: Option<&str>) -> Result<i32> {
    let store = PlanStore::from_config(root, cfg);
    let plan = build_plan(cfg, goal, context)?;
    let path = store.save_plan(&plan)?;
    print!("{}", render_plan(&plan));
    println!("\nSaved plan -> {}", path.display());
    Ok(exit_codes::OK)
}

fn cmd_run(
    root: &Path,
    mut cfg: AppConfig,
    goal: Option<String>,
    plan_path: Option<PathBuf>,
    context: Option<String>,
    max_retries: Option<u32>,
) -> Result<i32> {
    if let Some(max_retries) = max_retries {
        cfg.max_retries = max_retries;
    }
    let store = PlanStore::from_config(root, &cfg);

    let mut plan = match (plan_path, goal) {
        (Some(path), _) => {
            let plan = store.load_plan(&path)?;
            println!("Loaded plan: {}", path.display());
            plan
        }
        (None, Some(goal)) if !goal.trim().is_empty() => {
            let plan = build_plan(&cfg, goal.trim(), context.as_deref())?;
            let path = store.save_plan(&plan)?;
            println!("Saved plan -> {}", path.display());
            plan
        }
        _ => bail!("provide a goal or --plan <file>"),
    };
    print!("\n{}", render_plan(&plan));
    println!();

    let registry = default_registry(root)?;
    let mut scheduler = Scheduler::new(registry, cfg.scheduler_config(), cfg.review_policy()?);
    let mut entries: Vec<RunLogEntry> = Vec::new();
    let outcome = scheduler.run_with(&mut plan, |entry| {
        println!(
            "{:<7} {} [{}] {}",
            entry.status,
            entry.task_id,
            entry.executor,
            entry.note.as_deref().unwrap_or("")
        );
        entries.push(entry.clone());
    });

    // Persist even when the run aborted, so the partial log is kept.
    let run_path = store.append_run_log(&entries)?;
    let plan_path = store.save_plan(&plan)?;
    println!("\nRun log -> {}", run_path.display());
    println!("Updated plan -> {}", plan_path.display());

    let summary = outcome?;
    println!("{}", render_summary(&summary));
    if summary.failed > 0 {
        return Ok(exit_codes::TASKS_FAILED);
    }
    Ok(exit_codes::OK)
}

fn cmd_validate(root: &Path, cfg: &AppConfig, path: &Path) -> Result<i32> {
    let store = PlanStore::from_config(root, cfg);
    let plan = store.load_plan(path)?;
    println!(
        "{}: {} task(s) in {} phase(s)",
        path.display(),
        plan.task_count(),
        plan.phases().len()
    );
    Ok(exit_codes::OK)
}

fn build_plan(cfg: &AppConfig, goal: &str, context: Option<&str>) -> Result<Plan> {
    PlanBuilder::new(cfg.capability_hints()).build(goal, context, &mut RandomIds)
}
