// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod errors;
pub mod exec;
pub mod handler;
pub mod logging;
pub mod task;

use anyhow::Result;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::{PlanFile, TaskRegistry, load_and_validate};
use crate::dag::{DependencyGraph, RunReport};
use crate::handler::InitializationHandler;

pub use crate::dag::{InitState, RunOutcome};
pub use crate::task::{InitFn, Initializable, TaskRef};

/// High-level entry point used by `main.rs`.
///
/// Loads the plan, binds every item with a `cmd` to a [`exec::CommandTask`],
/// runs the resulting graph and prints a summary. Ctrl-C cancels the run.
///
/// Returns `None` for `--dry-run`.
pub async fn run(args: CliArgs) -> Result<Option<RunReport>> {
    let plan = load_and_validate(&args.plan)?;
    let registry = TaskRegistry::from_commands(&plan);
    let entries = plan.resolve(&registry);

    if args.dry_run {
        print_dry_run(&plan, &DependencyGraph::build(&entries));
        return Ok(None);
    }

    let mut handler = InitializationHandler::from_entries(entries);
    handler.warn_on_cycles(plan.config().warn_on_cycles);

    // Ctrl-C -> cancel the run.
    {
        let cancel = handler.cancel_handle();
        tokio::spawn(async move {
            tokio::select! {
                res = tokio::signal::ctrl_c() => {
                    if let Err(e) = res {
                        eprintln!("failed to listen for Ctrl+C: {e}");
                        return;
                    }
                    info!("Ctrl+C received; cancelling initialization");
                    cancel.cancel();
                }
                _ = cancel.cancelled() => {}
            }
        });
    }

    let report = handler.run().await;
    handler.shutdown();

    println!("{report}");
    for failure in &report.failures {
        println!("  failed: {} ({})", failure.task, failure.error);
    }

    Ok(Some(report))
}

/// Dry-run output: items, their dependencies and what would be skipped.
fn print_dry_run(plan: &PlanFile, graph: &DependencyGraph) {
    println!("initdag dry-run");
    println!("  config.warn_on_cycles = {}", plan.config().warn_on_cycles);
    println!();

    println!("items ({}):", plan.items().len());
    for item in plan.items() {
        println!("  - {}", item.name);
        match &item.cmd {
            Some(cmd) => println!("      cmd: {cmd}"),
            None => println!("      cmd: <none; skipped>"),
        }
        if !item.after.is_empty() {
            println!("      after: {:?}", item.after);
        }
        if !item.enabled {
            println!("      enabled: false");
        }
    }
    println!();

    println!("scheduled tasks ({}):", graph.len());
    for task in graph.active_tasks() {
        let deps: Vec<&str> = graph.dependencies_of(task).iter().map(|d| d.name()).collect();
        println!("  - {} <- {:?}", task.name(), deps);
    }

    if let Some(task) = graph.find_cycle() {
        println!();
        println!("warning: dependency cycle involving '{task}'; a run would deadlock");
    }

    debug!("dry-run complete (no execution)");
}
