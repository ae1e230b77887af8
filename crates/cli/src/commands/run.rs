use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{bail, Result};
use clap::Args;
use colored::*;
use parathread_core::colors::node_color;
use parathread_core::thread_manager::ThreadManager;
use parathread_core::{Executor, ExecutorConfig, LogSink, RunReport, TracingWriter};
use parathread_firelog::{FirebaseWriter, AUTH_TOKEN_ENV, ENDPOINT_ENV};

use super::SelectionArgs;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Thread file (YAML, or TOML with a .toml extension)
    pub file: PathBuf,

    #[command(flatten)]
    pub selection: SelectionArgs,

    /// Walk the graph with a fixed delay instead of running the commands
    #[arg(long)]
    pub dry_run: bool,

    /// Synthetic duration of each node during a dry run, in milliseconds
    #[arg(long, default_value_t = 2000)]
    pub dry_run_delay_ms: u64,

    /// Firebase database URL receiving node status messages
    #[arg(long, env = ENDPOINT_ENV)]
    pub endpoint: Option<String>,

    /// Firebase auth token
    #[arg(long, env = AUTH_TOKEN_ENV, hide_env_values = true)]
    pub auth_token: Option<String>,

    /// Path grouping this run's status messages (defaults to the thread's ref, then the start time)
    #[arg(long = "ref")]
    pub reference: Option<String>,
}

pub async fn execute(args: RunArgs) -> Result<()> {
    let manager = ThreadManager::load(&args.file)
        .map_err(|e| anyhow::anyhow!("Failed to load thread file: {}", e))?;

    let graph = manager
        .build_graph()
        .map_err(|e| anyhow::anyhow!("Failed to build graph: {}", e))?;
    let mut graph = manager
        .select(graph, &args.selection.to_selection())
        .map_err(|e| anyhow::anyhow!("Failed to select nodes: {}", e))?;

    graph.attach_logger(status_sink(&manager, &args)?);

    let mode = if args.dry_run { "Dry running" } else { "Running" };
    println!(
        "{} {} {}",
        mode.bold(),
        manager.name().cyan(),
        format!("({} nodes)", graph.len()).dimmed()
    );
    println!();

    let executor = Executor::new(ExecutorConfig {
        dry_run_delay: Duration::from_millis(args.dry_run_delay_ms),
    });
    let report = if args.dry_run {
        executor.dry_run(&mut graph).await
    } else {
        executor.run(&mut graph).await
    };

    print_summary(&report);

    let failures = report.failures();
    if !failures.is_empty() {
        bail!("{} of {} nodes failed", failures.len(), report.len());
    }

    println!();
    println!(
        "{} {}",
        "✓".green().bold(),
        "All nodes completed successfully!".green().bold()
    );
    Ok(())
}

/// Firebase when an endpoint is configured, `tracing` otherwise
fn status_sink(manager: &ThreadManager, args: &RunArgs) -> Result<Arc<LogSink>> {
    let logger = manager.logger_config();

    let Some(endpoint) = args.endpoint.clone().or(logger.endpoint) else {
        return Ok(LogSink::spawn(TracingWriter));
    };
    let Some(auth_token) = args.auth_token.clone().or(logger.auth_token) else {
        bail!(
            "A Firebase endpoint is configured but no auth token was given (set {} or --auth-token)",
            AUTH_TOKEN_ENV
        );
    };
    let reference = args
        .reference
        .clone()
        .or(logger.reference)
        .unwrap_or_else(default_reference);

    println!("{} {}/{}", "Status log:".dimmed(), endpoint, reference);
    Ok(LogSink::spawn(FirebaseWriter::new(
        endpoint, auth_token, reference,
    )))
}

fn default_reference() -> String {
    let seconds = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    format!("run-{}", seconds)
}

fn print_summary(report: &RunReport) {
    println!("{}", "Summary".bold().underline());
    for outcome in report.in_start_order() {
        let key = outcome.key.color(node_color(&outcome.key)).bold();
        match &outcome.error {
            None => println!(
                "  {} {} {}",
                "✓".green(),
                key,
                format!("({:?}, waited {:?})", outcome.duration(), outcome.waited).dimmed()
            ),
            Some(error) => println!("  {} {} {}", "✗".red(), key, error.red()),
        }
    }
    println!(
        "  {}",
        format!("total {:?}", report.duration).dimmed()
    );
}
